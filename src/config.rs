//! MAPQUEUE - Engine Configuration
//! Tunable parameters for the durable engines. Storage roots are always
//! passed in explicitly; there is no process-wide default path.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MapQueueError, Result};

/// Highest zlib compression level.
pub const MAX_COMPRESSION: u32 = 9;

/// Configuration for mapqueue engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for all data files.
    pub data_dir: PathBuf,

    /// Whether to fsync the log after every append.
    pub sync_writes: bool,

    /// zlib compression level applied to payloads (0-9).
    pub compression: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            sync_writes: true,
            compression: 6,
        }
    }
}

impl Config {
    /// Create a new Config with a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set whether appends are synced to disk immediately.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Set the payload compression level.
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level;
        self
    }

    /// Reject settings the engines cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.compression > MAX_COMPRESSION {
            return Err(MapQueueError::Config(format!(
                "compression level {} exceeds {}",
                self.compression, MAX_COMPRESSION
            )));
        }
        Ok(())
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}
