//! MAPQUEUE - Payload Codec
//! Wraps stored payloads in zlib and defines the tombstone sentinel.
//!
//! An empty stored payload means "no value". A compressed stream is never
//! empty, so a packed value can never be mistaken for a tombstone.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{MapQueueError, Result};

/// The stored form of "no value".
pub const TOMBSTONE: &[u8] = b"";

/// Returns true if a raw or stored value counts as absent.
pub fn is_none(value: Option<&[u8]>) -> bool {
    value.map_or(true, <[u8]>::is_empty)
}

/// zlib payload codec with a fixed compression level.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    level: Compression,
}

impl PayloadCodec {
    /// Create a codec compressing at `level` (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }

    /// Pack a raw value for storage. `None` and empty both become the tombstone.
    pub fn pack(&self, raw: Option<&[u8]>) -> Result<Vec<u8>> {
        if is_none(raw) {
            return Ok(TOMBSTONE.to_vec());
        }
        let raw = raw.unwrap_or(TOMBSTONE);
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2 + 16), self.level);
        encoder
            .write_all(raw)
            .map_err(|e| MapQueueError::Codec(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| MapQueueError::Codec(e.to_string()))
    }

    /// Unpack a stored payload. The tombstone yields `None`.
    pub fn unpack(&self, stored: &[u8]) -> Result<Option<Vec<u8>>> {
        if stored.is_empty() {
            return Ok(None);
        }
        let mut decoder = ZlibDecoder::new(stored);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(|e| MapQueueError::Codec(format!("corrupted payload: {}", e)))?;
        Ok(Some(raw))
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

/// Pack with the default compression level.
pub fn pack(raw: Option<&[u8]>) -> Result<Vec<u8>> {
    PayloadCodec::default().pack(raw)
}

/// Unpack a stored payload.
pub fn unpack(stored: &[u8]) -> Result<Option<Vec<u8>>> {
    PayloadCodec::default().unpack(stored)
}
