//! MAPQUEUE - Engine Contracts
//! The Map and Queue interfaces every engine implements, and the scoped
//! open/close discipline they share.
//!
//! An engine only supplies raw storage (`get_raw`/`put_raw` for a Map,
//! `add`/`pop` for a Queue). The point-in-time semantics, payload packing and
//! tombstones live in the provided methods so every backend agrees on them.

pub mod concurrent;
pub mod local;
pub mod log_map;
pub mod metrics;
pub mod queue;
pub mod wal;

use std::iter::FusedIterator;
use std::ops::{Deref, DerefMut};

use uuid::Uuid;

use crate::error::Result;
use crate::payload::PayloadCodec;
use crate::types::{now_millis, Key, Timestamp};

pub use self::concurrent::ConcurrentMap;
pub use self::local::LocalMap;
pub use self::log_map::LogMap;
pub use self::queue::LocalQueue;

/// Lifecycle shared by every Map and Queue engine.
pub trait Context {
    /// Acquire the engine's resources. Must be called before first use.
    fn open(&mut self) -> Result<()>;

    /// Release the engine's resources. Closing a closed engine is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// An open engine that is closed exactly once when the session ends.
///
/// Dropping the session closes the engine on every exit path, including
/// `?` propagation and panics. Use [`Session::finish`] to observe the close
/// result.
pub struct Session<'a, E: Context> {
    engine: &'a mut E,
    finished: bool,
}

impl<'a, E: Context> Session<'a, E> {
    /// Open `engine` for the lifetime of the returned session.
    pub fn open(engine: &'a mut E) -> Result<Self> {
        engine.open()?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    /// Close the engine now and report any failure.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.engine.close()
    }
}

impl<E: Context> Deref for Session<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &*self.engine
    }
}

impl<E: Context> DerefMut for Session<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut *self.engine
    }
}

impl<E: Context> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.engine.close() {
            log::warn!("Failed to close engine at end of session: {}", e);
        }
    }
}

/// Run `f` against an opened `engine`, closing it afterwards.
///
/// The first error wins: a failure inside `f` is returned even if closing
/// also fails.
pub fn scoped<E, T, F>(engine: &mut E, f: F) -> Result<T>
where
    E: Context,
    F: FnOnce(&mut E) -> Result<T>,
{
    let mut session = Session::open(engine)?;
    let outcome = f(&mut *session);
    let closed = session.finish();
    let value = outcome?;
    closed?;
    Ok(value)
}

/// Append-only, time-versioned key/value store.
///
/// Every write appends a new version for `(uuid, time)`; nothing is ever
/// overwritten. A read as of time `T` sees the newest version with
/// `version.time <= T`, the most recently inserted one winning ties, and
/// never sees versions written for a later time.
pub trait TemporalMap: Context {
    /// Stored payload of the newest version of `uuid` with `time <= time`.
    fn get_raw(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>>;

    /// Append an already packed payload under `key`.
    fn put_raw(&mut self, key: Key, stored: Vec<u8>) -> Result<Key>;

    /// Codec used to pack and unpack payloads.
    fn codec(&self) -> PayloadCodec {
        PayloadCodec::default()
    }

    /// Unpacked value of `uuid` as of `time`, or `None` for a missing
    /// version or a tombstone.
    fn get(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>> {
        match self.get_raw(uuid, time)? {
            Some(stored) => self.codec().unpack(&stored),
            None => Ok(None),
        }
    }

    /// Append `value` under an explicit key. Useful for predated corrections.
    fn put_at(&mut self, key: Key, value: Option<&[u8]>) -> Result<Key> {
        let stored = self.codec().pack(value)?;
        self.put_raw(key, stored)
    }

    /// Append `value` for `uuid` at the current time.
    fn put(&mut self, uuid: Uuid, kind: &str, value: Option<&[u8]>) -> Result<Key> {
        self.put_at(Key::now(uuid, kind), value)
    }

    /// Allocate a fresh uuid and write its first version.
    fn create(&mut self, kind: &str, value: &[u8]) -> Result<Key> {
        self.put(Uuid::new_v4(), kind, Some(value))
    }

    /// Write a new version for `uuid`. The uuid need not exist yet.
    fn update(&mut self, uuid: Uuid, kind: &str, value: &[u8]) -> Result<Key> {
        self.put(uuid, kind, Some(value))
    }

    /// Write a tombstone for `uuid`. Earlier versions stay readable as of
    /// earlier times.
    fn delete(&mut self, uuid: Uuid) -> Result<Key> {
        self.put(uuid, "", None)
    }

    /// Value of `uuid` as of now.
    fn read(&self, uuid: &Uuid) -> Result<Option<Vec<u8>>> {
        self.read_at(uuid, now_millis())
    }

    fn read_at(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>> {
        self.get(uuid, time)
    }

    fn exists(&self, uuid: &Uuid) -> Result<bool> {
        self.exists_at(uuid, now_millis())
    }

    fn exists_at(&self, uuid: &Uuid, time: Timestamp) -> Result<bool> {
        Ok(self.read_at(uuid, time)?.is_some())
    }
}

/// Unordered work queue.
///
/// No ordering is promised between producers and consumers: not FIFO, not
/// LIFO, not priority. An empty queue is reported by `pop` returning `None`.
pub trait Queue: Context {
    /// Append a value and return a copy of it.
    fn add(&mut self, kind: &str, value: &[u8]) -> Result<Vec<u8>>;

    /// Remove and return some value, or `None` if the queue is empty.
    fn pop(&mut self) -> Result<Option<Vec<u8>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over popped values until the queue is observed empty.
    fn drain(&mut self) -> Drain<'_, Self>
    where
        Self: Sized,
    {
        Drain {
            queue: self,
            done: false,
        }
    }
}

/// Iterator returned by [`Queue::drain`].
///
/// Once it has observed an empty queue or an error it stays finished, even
/// if values are added afterwards.
pub struct Drain<'a, Q: Queue> {
    queue: &'a mut Q,
    done: bool,
}

impl<Q: Queue> Drain<'_, Q> {
    /// Add a value through the drain. It does not revive a finished drain.
    pub fn add(&mut self, kind: &str, value: &[u8]) -> Result<Vec<u8>> {
        self.queue.add(kind, value)
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }
}

impl<Q: Queue> Iterator for Drain<'_, Q> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.queue.pop() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<Q: Queue> FusedIterator for Drain<'_, Q> {}
