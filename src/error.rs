//! MAPQUEUE - Custom Error Types
//! Defines the error hierarchy shared by every Map and Queue engine.

use thiserror::Error;

/// Custom Result type for mapqueue engines.
pub type Result<T> = std::result::Result<T, MapQueueError>;

/// Error types for mapqueue engines.
///
/// A missing version is never an error: reads return `None`.
/// Only structural failures surface here.
#[derive(Error, Debug)]
pub enum MapQueueError {
    /// A byte or string input could not be decoded into a Key.
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// A stored payload failed to decompress.
    #[error("Codec error: {0}")]
    Codec(String),

    /// I/O errors from file operations (log append, recovery).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected (CRC mismatch).
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Log recovery failure.
    #[error("Log recovery failed: {0}")]
    RecoveryFailed(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine was used before `open` or after `close`.
    #[error("Engine is closed")]
    Closed,
}

impl From<bincode::Error> for MapQueueError {
    fn from(err: bincode::Error) -> Self {
        MapQueueError::Serialization(err.to_string())
    }
}
