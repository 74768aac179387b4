//! MAPQUEUE - Concurrent Map Wrapper
//! Thread-safe wrapper around any [`TemporalMap`] using Arc + RwLock.
//!
//! ## Concurrency Model
//! - **Reads** (`read`, `exists`, ...) acquire a **read lock** (shared)
//! - **Writes** (`create`, `update`, `delete`, `put_at`) acquire a **write lock** (exclusive)
//! - The write lock serializes writers, so for a time tie the write that
//!   acquired the lock last wins.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::error::Result;
use crate::types::{Key, Timestamp};

use super::TemporalMap;

/// Thread-safe, cloneable handle to a shared Map engine.
///
/// ## Example
/// ```no_run
/// use mapqueue::engine::{ConcurrentMap, LocalMap};
/// use std::thread;
///
/// let map = ConcurrentMap::open(LocalMap::new()).unwrap();
/// let writer = map.clone();
///
/// let key = thread::spawn(move || writer.create("hello", b"now").unwrap())
///     .join()
///     .unwrap();
/// assert_eq!(map.read(&key.uuid).unwrap(), Some(b"now".to_vec()));
/// ```
pub struct ConcurrentMap<M> {
    inner: Arc<RwLock<M>>,
}

impl<M> Clone for ConcurrentMap<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: TemporalMap> ConcurrentMap<M> {
    /// Open `engine` and wrap it for shared use.
    pub fn open(mut engine: M) -> Result<Self> {
        engine.open()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(engine)),
        })
    }

    // Engines append each version in one step, so a poisoned lock still
    // guards consistent state.
    fn read_lock(&self) -> RwLockReadGuard<'_, M> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, M> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, kind: &str, value: &[u8]) -> Result<Key> {
        self.write_lock().create(kind, value)
    }

    pub fn update(&self, uuid: Uuid, kind: &str, value: &[u8]) -> Result<Key> {
        self.write_lock().update(uuid, kind, value)
    }

    pub fn delete(&self, uuid: Uuid) -> Result<Key> {
        self.write_lock().delete(uuid)
    }

    pub fn put_at(&self, key: Key, value: Option<&[u8]>) -> Result<Key> {
        self.write_lock().put_at(key, value)
    }

    pub fn read(&self, uuid: &Uuid) -> Result<Option<Vec<u8>>> {
        self.read_lock().read(uuid)
    }

    pub fn read_at(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>> {
        self.read_lock().read_at(uuid, time)
    }

    pub fn exists(&self, uuid: &Uuid) -> Result<bool> {
        self.read_lock().exists(uuid)
    }

    pub fn exists_at(&self, uuid: &Uuid, time: Timestamp) -> Result<bool> {
        self.read_lock().exists_at(uuid, time)
    }

    /// Run `f` with shared access to the engine.
    pub fn with_engine<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&M) -> R,
    {
        f(&self.read_lock())
    }

    /// Close the shared engine. Other handles see `Closed` afterwards.
    pub fn close(&self) -> Result<()> {
        self.write_lock().close()
    }
}
