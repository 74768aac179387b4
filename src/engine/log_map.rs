//! MAPQUEUE - LogMap (Durable File-Backed Engine)
//! Persists every version to an append-only [`VersionLog`] and serves reads
//! from an ordered index rebuilt from that log on open.
//!
//! The index is keyed the way a range-scanning store keys its rows:
//! `scan_key(uuid, time) || !seq`. A forward scan starting at
//! `scan_key(uuid, T)` lands on the newest version with `time <= T`, and
//! among equal times on the most recent insertion.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::config::Config;
use crate::error::{MapQueueError, Result};
use crate::key::{KeyCodec, PREFIX_LEN, UUID_LEN};
use crate::payload::PayloadCodec;
use crate::types::{Key, Timestamp, Value, Version};

use super::metrics::EngineMetrics;
use super::wal::VersionLog;
use super::{Context, TemporalMap};

/// File name of the version log inside `Config::data_dir`.
pub const LOG_FILE: &str = "mapqueue.log";

/// Open state of a LogMap.
struct LogState {
    log: VersionLog,
    index: BTreeMap<Vec<u8>, Version>,
    next_seq: u64,
}

impl LogState {
    fn insert(&mut self, key: &Key, stored: Vec<u8>) {
        let mut index_key = Vec::with_capacity(PREFIX_LEN + 8);
        index_key.extend_from_slice(&KeyCodec::scan_key(&key.uuid, key.time));
        index_key.extend_from_slice(&(u64::MAX - self.next_seq).to_be_bytes());
        self.next_seq += 1;
        self.index
            .insert(index_key, Version::new(key.kind.clone(), stored));
    }

    /// Index entries of `uuid` starting at the newest with `time <= time`.
    fn scan<'a>(
        &'a self,
        uuid: &'a Uuid,
        time: Timestamp,
    ) -> impl Iterator<Item = (&'a Vec<u8>, &'a Version)> + 'a {
        let prefix = uuid.to_bytes_le();
        self.index
            .range(KeyCodec::scan_key(uuid, time).to_vec()..)
            .take_while(move |(k, _)| k[..UUID_LEN] == prefix)
    }
}

/// Durable append-only Map stored under `Config::data_dir`.
pub struct LogMap {
    config: Config,
    codec: PayloadCodec,
    state: Option<LogState>,
    metrics: EngineMetrics,
}

impl LogMap {
    /// Create a closed LogMap. Call [`Context::open`] before use.
    pub fn new(config: Config) -> Self {
        let codec = PayloadCodec::new(config.compression);
        Self {
            config,
            codec,
            state: None,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn state(&self) -> Result<&LogState> {
        self.state.as_ref().ok_or(MapQueueError::Closed)
    }

    /// Every version of `uuid`, newest first, with payloads unpacked.
    pub fn history(&self, uuid: &Uuid) -> Result<Vec<(Timestamp, Option<Value>)>> {
        self.state()?
            .scan(uuid, Timestamp::MAX)
            .map(|(k, version)| {
                let time = KeyCodec::decode_sortable(&k[..PREFIX_LEN])?.time;
                Ok((time, self.codec.unpack(&version.payload)?))
            })
            .collect()
    }

    /// Kind tag of the version `uuid` resolves to as of `time`.
    pub fn kind_at(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<String>> {
        Ok(self
            .state()?
            .scan(uuid, time)
            .next()
            .map(|(_, version)| version.kind.clone()))
    }

    /// Total versions stored.
    pub fn version_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.index.len())
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

impl Context for LogMap {
    fn open(&mut self) -> Result<()> {
        if self.state.is_some() {
            return Ok(());
        }
        self.config.validate()?;
        self.config.ensure_dirs()?;

        let path = self.config.data_dir.join(LOG_FILE);
        let records = VersionLog::recover(&path)?;
        let log = VersionLog::open(path, self.config.sync_writes)?;

        let mut state = LogState {
            log,
            index: BTreeMap::new(),
            next_seq: 0,
        };
        let recovered = records.len();
        for (key, stored) in records {
            state.insert(&key, stored);
        }
        self.metrics.record_recovered(recovered);

        log::info!(
            "LogMap opened at {:?} ({} versions recovered)",
            self.config.data_dir,
            recovered
        );
        self.state = Some(state);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut state) = self.state.take() {
            if !self.config.sync_writes {
                state.log.sync()?;
            }
            log::info!(
                "LogMap closed at {:?} ({} versions)",
                state.log.path(),
                state.index.len()
            );
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl TemporalMap for LogMap {
    fn get_raw(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>> {
        let found = self
            .state()?
            .scan(uuid, time)
            .next()
            .map(|(_, version)| version.payload.clone());
        self.metrics.record_get(found.as_ref().map(Vec::len));
        Ok(found)
    }

    fn put_raw(&mut self, key: Key, stored: Vec<u8>) -> Result<Key> {
        let state = self.state.as_mut().ok_or(MapQueueError::Closed)?;
        state.log.append(&key, &stored)?;
        self.metrics
            .record_put(PREFIX_LEN + key.kind.len(), stored.len());
        state.insert(&key, stored);
        log::debug!("LogMap put {} @ {}", key.uuid, key.time);
        Ok(key)
    }

    fn codec(&self) -> PayloadCodec {
        self.codec
    }
}

impl Drop for LogMap {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close LogMap: {}", e);
        }
    }
}
