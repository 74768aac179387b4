//! MAPQUEUE - Append-Only Time-Versioned Map and Unordered Queue
//!
//! A uniform interface for an append-only key/value store whose reads are
//! answered as of a point in time, and for an unordered work queue. Engines
//! are interchangeable: they only store packed bytes under an identity key.
//!
//! ## Features
//! - **KeyCodec**: byte, sortable and display encodings of `(uuid, time, kind)`
//! - **Payload codec**: zlib compression with an empty-payload tombstone
//! - **LocalMap**: in-memory engine with a per-entity sorted revision index
//! - **LogMap**: durable engine over a CRC32-framed append-only log
//! - **LocalQueue**: in-memory unordered queue with a fused draining iterator
//! - **Concurrency**: Arc + RwLock wrapper for sharing a Map between threads
//! - **Metrics**: lock-free atomic counters
//!
//! ## Example
//! ```no_run
//! use mapqueue::engine::{LocalMap, TemporalMap, scoped};
//!
//! let mut map = LocalMap::new();
//! scoped(&mut map, |db| {
//!     let key = db.create("hello", b"now")?;
//!     db.put_at(mapqueue::types::Key::new(key.uuid, key.time - 10, "hello"), Some(b"past".as_slice()))?;
//!     assert_eq!(db.read(&key.uuid)?, Some(b"now".to_vec()));
//!     assert_eq!(db.read_at(&key.uuid, key.time - 1)?, Some(b"past".to_vec()));
//!     Ok(())
//! })
//! .unwrap();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod payload;
pub mod types;

pub use config::Config;
pub use engine::{Context, LocalMap, LocalQueue, LogMap, Queue, Session, TemporalMap};
pub use error::{MapQueueError, Result};
pub use key::KeyCodec;
pub use payload::PayloadCodec;
pub use types::{Key, Timestamp};
