//! MAPQUEUE - Version Log
//! Append-only file of every version written to a [`super::LogMap`].
//! The log is the source of truth; the in-memory index is rebuilt from it
//! on open.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{MapQueueError, Result};
use crate::key::KeyCodec;
use crate::types::Key;

/// Frame overhead: body length prefix and trailing CRC.
const FRAME_OVERHEAD: usize = 8;

/// Largest body a frame may carry. A length prefix above this is corruption,
/// not a torn tail.
pub const MAX_BODY_LEN: usize = 1 << 30;

/// One appended version as it is stored in the log body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LogRecord {
    /// Wire-encoded key.
    key: Vec<u8>,
    /// Packed payload, empty for a tombstone.
    value: Vec<u8>,
}

/// Append-only version log.
///
/// ## Binary Format (per frame)
/// ```text
/// [body_len: 4 bytes (LE)][body: bincode(LogRecord)][crc32(body): 4 bytes (LE)]
/// ```
pub struct VersionLog {
    path: PathBuf,
    file: File,
    sync_writes: bool,
}

impl VersionLog {
    /// Open or create a log file for appending.
    pub fn open(path: PathBuf, sync_writes: bool) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            sync_writes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(key: &Key, value: &[u8]) -> Result<Vec<u8>> {
        let record = LogRecord {
            key: KeyCodec::encode(key),
            value: value.to_vec(),
        };
        let body = bincode::serialize(&record)?;
        let body_len = Self::body_len(body.len())?;
        let mut buf = BytesMut::with_capacity(body.len() + FRAME_OVERHEAD);
        buf.put_u32_le(body_len);
        buf.put_slice(&body);
        buf.put_u32_le(crc32fast::hash(&body));
        Ok(buf.to_vec())
    }

    fn body_len(len: usize) -> Result<u32> {
        match u32::try_from(len) {
            Ok(n) if len <= MAX_BODY_LEN => Ok(n),
            _ => Err(MapQueueError::Serialization(format!(
                "frame body of {} bytes exceeds the {} byte limit",
                len, MAX_BODY_LEN
            ))),
        }
    }

    /// Append one version. Synced to disk when `sync_writes` is set.
    ///
    /// A failed write is cut back off the file so the log never holds a
    /// partial frame ahead of later appends.
    pub fn append(&mut self, key: &Key, value: &[u8]) -> Result<()> {
        let frame = Self::encode(key, value)?;
        let start = self.file.metadata()?.len();
        if let Err(e) = self.file.write_all(&frame) {
            self.rollback(start);
            return Err(e.into());
        }
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn rollback(&mut self, len: u64) {
        if let Err(e) = self.file.set_len(len) {
            log::error!(
                "Failed to cut partial frame from {:?} back to {} bytes: {}",
                self.path,
                len,
                e
            );
        }
    }

    /// Flush buffered appends to disk.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Replay every intact frame in `path`, oldest first.
    ///
    /// A frame cut short at the end of the file (a crash mid-append) is
    /// dropped and the file truncated to the last intact frame. A complete
    /// frame whose CRC does not match, or a length prefix larger than
    /// [`MAX_BODY_LEN`], is corruption: recovery fails and the file is left
    /// untouched.
    pub fn recover(path: &Path) -> Result<Vec<(Key, Vec<u8>)>> {
        let mut raw = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut raw)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let total = raw.len();
        let mut buf = Bytes::from(raw);
        let mut records = Vec::new();
        let mut intact = 0;

        while buf.remaining() >= 4 {
            let body_len = buf.get_u32_le() as usize;
            if body_len > MAX_BODY_LEN {
                return Err(MapQueueError::Corruption(format!(
                    "frame {} of {:?} claims a {} byte body",
                    records.len(),
                    path,
                    body_len
                )));
            }
            if buf.remaining() < body_len + 4 {
                break;
            }
            let body = buf.copy_to_bytes(body_len);
            let crc = buf.get_u32_le();
            if crc32fast::hash(&body) != crc {
                return Err(MapQueueError::Corruption(format!(
                    "CRC mismatch in frame {} of {:?}",
                    records.len(),
                    path
                )));
            }
            let record: LogRecord = bincode::deserialize(&body)?;
            let key = KeyCodec::decode(&record.key)
                .map_err(|e| MapQueueError::RecoveryFailed(e.to_string()))?;
            records.push((key, record.value));
            intact = total - buf.remaining();
        }

        if intact < total {
            log::warn!(
                "Dropping {} trailing bytes of a partial frame in {:?}",
                total - intact,
                path
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(intact as u64)?;
            file.sync_all()?;
        }

        Ok(records)
    }
}
