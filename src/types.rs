//! MAPQUEUE - Core Type Definitions
//! Defines fundamental types used across every engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Payload type. Using Vec<u8> allows arbitrary binary values.
pub type Value = Vec<u8>;

/// Identity of one write: which entity, when, and what kind of record.
///
/// `kind` is informational metadata for the version. Lookups are keyed on
/// `(uuid, time)` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    pub uuid: Uuid,
    pub time: Timestamp,
    pub kind: String,
}

impl Key {
    pub fn new(uuid: Uuid, time: Timestamp, kind: impl Into<String>) -> Self {
        Self {
            uuid,
            time,
            kind: kind.into(),
        }
    }

    /// Key for `uuid` stamped with the current time.
    pub fn now(uuid: Uuid, kind: impl Into<String>) -> Self {
        Self::new(uuid, now_millis(), kind)
    }
}

/// A single stored version: its kind tag and packed payload.
/// An empty payload is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub kind: String,
    pub payload: Value,
}

impl Version {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Returns true if this version marks a logical delete.
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Current time in milliseconds since the Unix epoch.
/// Evaluated on every call.
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_evaluated_per_call() {
        let first = now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(now_millis() > first);
    }

    #[test]
    fn test_tombstone() {
        assert!(Version::new("", Vec::new()).is_tombstone());
        assert!(!Version::new("hello", b"x".to_vec()).is_tombstone());
    }
}
