//! MAPQUEUE - LocalMap (In-Memory Reference Engine)
//! Keeps, for every entity, a revision index sorted newest first so a
//! point-in-time read is one binary search.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{MapQueueError, Result};
use crate::key::PREFIX_LEN;
use crate::payload::PayloadCodec;
use crate::types::{Key, Timestamp, Value, Version};

use super::metrics::EngineMetrics;
use super::{Context, TemporalMap};

/// Versions of one entity ordered by descending time, which is the same
/// order as ascending negated time without the overflow at `i64::MIN`.
///
/// Entries with equal time are ordered newest insertion first.
#[derive(Debug, Default)]
struct Revisions {
    entries: Vec<(Timestamp, Version)>,
}

impl Revisions {
    /// Leftmost position whose time is `<= time`.
    fn position(&self, time: Timestamp) -> usize {
        self.entries.partition_point(|(t, _)| *t > time)
    }

    fn insert(&mut self, time: Timestamp, version: Version) {
        let i = self.position(time);
        self.entries.insert(i, (time, version));
    }

    fn as_of(&self, time: Timestamp) -> Option<&Version> {
        self.entries
            .get(self.position(time))
            .map(|(_, version)| version)
    }
}

/// In-memory append-only Map.
///
/// Not internally synchronized; wrap it in a [`super::ConcurrentMap`] to
/// share it between threads. All state is dropped on `close`.
pub struct LocalMap {
    /// uuid -> revision index. `None` while closed.
    revisions: Option<HashMap<Uuid, Revisions>>,
    codec: PayloadCodec,
    metrics: EngineMetrics,
}

impl LocalMap {
    /// Create a closed LocalMap. Call [`Context::open`] before use.
    pub fn new() -> Self {
        Self::with_codec(PayloadCodec::default())
    }

    pub fn with_codec(codec: PayloadCodec) -> Self {
        Self {
            revisions: None,
            codec,
            metrics: EngineMetrics::new(),
        }
    }

    fn state(&self) -> Result<&HashMap<Uuid, Revisions>> {
        self.revisions.as_ref().ok_or(MapQueueError::Closed)
    }

    /// Every version of `uuid`, newest first, with payloads unpacked.
    pub fn history(&self, uuid: &Uuid) -> Result<Vec<(Timestamp, Option<Value>)>> {
        let Some(revisions) = self.state()?.get(uuid) else {
            return Ok(Vec::new());
        };
        revisions
            .entries
            .iter()
            .map(|(time, version)| Ok((*time, self.codec.unpack(&version.payload)?)))
            .collect()
    }

    /// Number of entities with at least one version.
    pub fn len(&self) -> usize {
        self.revisions.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total versions across all entities.
    pub fn version_count(&self) -> usize {
        self.revisions
            .as_ref()
            .map_or(0, |m| m.values().map(|r| r.entries.len()).sum())
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }
}

impl Default for LocalMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for LocalMap {
    fn open(&mut self) -> Result<()> {
        if self.revisions.is_none() {
            self.revisions = Some(HashMap::new());
            log::debug!("LocalMap opened");
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(revisions) = self.revisions.take() {
            log::debug!("LocalMap closed ({} entities dropped)", revisions.len());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.revisions.is_some()
    }
}

impl TemporalMap for LocalMap {
    fn get_raw(&self, uuid: &Uuid, time: Timestamp) -> Result<Option<Vec<u8>>> {
        let found = self
            .state()?
            .get(uuid)
            .and_then(|revisions| revisions.as_of(time))
            .map(|version| version.payload.clone());
        self.metrics.record_get(found.as_ref().map(Vec::len));
        Ok(found)
    }

    fn put_raw(&mut self, key: Key, stored: Vec<u8>) -> Result<Key> {
        let revisions = self.revisions.as_mut().ok_or(MapQueueError::Closed)?;
        self.metrics
            .record_put(PREFIX_LEN + key.kind.len(), stored.len());
        revisions
            .entry(key.uuid)
            .or_default()
            .insert(key.time, Version::new(key.kind.clone(), stored));
        log::debug!("LocalMap put {} @ {}", key.uuid, key.time);
        Ok(key)
    }

    fn codec(&self) -> PayloadCodec {
        self.codec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T: Timestamp = 1_000_000;

    fn opened() -> LocalMap {
        let mut map = LocalMap::new();
        map.open().unwrap();
        map
    }

    #[test]
    fn test_point_in_time() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.put_at(Key::new(uuid, T, "hello"), Some(b"now".as_slice())).unwrap();
        map.put_at(Key::new(uuid, T - 10, "hello"), Some(b"past".as_slice())).unwrap();
        map.put_at(Key::new(uuid, T + 10, "hello"), Some(b"future".as_slice())).unwrap();

        assert_eq!(map.read_at(&uuid, T).unwrap(), Some(b"now".to_vec()));
        assert_eq!(map.read_at(&uuid, T - 1).unwrap(), Some(b"past".to_vec()));
        assert_eq!(map.read_at(&uuid, T + 100).unwrap(), Some(b"future".to_vec()));
        assert_eq!(map.read_at(&uuid, T - 20).unwrap(), None);
    }

    #[test]
    fn test_missing_entity() {
        let map = opened();
        let uuid = Uuid::new_v4();
        assert_eq!(map.read_at(&uuid, T).unwrap(), None);
        assert!(!map.exists_at(&uuid, T).unwrap());
    }

    #[test]
    fn test_tombstone_hides_value_from_then_on() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.put_at(Key::new(uuid, T - 10, "deleted"), Some(b"deleted".as_slice())).unwrap();
        map.put_at(Key::new(uuid, T, ""), None).unwrap();

        assert!(!map.exists_at(&uuid, T).unwrap());
        assert_eq!(map.read_at(&uuid, T).unwrap(), None);
        assert_eq!(map.read_at(&uuid, T - 1).unwrap(), Some(b"deleted".to_vec()));
        assert_eq!(map.version_count(), 2);
    }

    #[test]
    fn test_predated_write_does_not_disturb_present() {
        let mut map = opened();
        let key = map.put_at(Key::new(Uuid::new_v4(), 1_000, "hello"), Some(b"now".as_slice())).unwrap();
        assert_eq!(key.time, 1_000);
        assert_eq!(map.read_at(&key.uuid, 1_000).unwrap(), Some(b"now".to_vec()));

        map.put_at(Key::new(key.uuid, 990, "hello"), Some(b"past".as_slice())).unwrap();
        assert_eq!(map.read_at(&key.uuid, 1_000).unwrap(), Some(b"now".to_vec()));
        assert_eq!(map.read_at(&key.uuid, 995).unwrap(), Some(b"past".to_vec()));
    }

    #[test]
    fn test_time_tie_latest_insert_wins() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.put_at(Key::new(uuid, T, "a"), Some(b"first".as_slice())).unwrap();
        map.put_at(Key::new(uuid, T, "b"), Some(b"second".as_slice())).unwrap();
        assert_eq!(map.read_at(&uuid, T).unwrap(), Some(b"second".to_vec()));

        map.put_at(Key::new(uuid, T, ""), None).unwrap();
        assert_eq!(map.read_at(&uuid, T).unwrap(), None);
    }

    #[test]
    fn test_create_update_delete_now() {
        let mut map = opened();
        let key = map.create("hello", b"v1").unwrap();
        assert_eq!(key.kind, "hello");
        assert!(map.exists(&key.uuid).unwrap());
        assert_eq!(map.read(&key.uuid).unwrap(), Some(b"v1".to_vec()));

        map.update(key.uuid, "hello", b"v2").unwrap();
        assert_eq!(map.read(&key.uuid).unwrap(), Some(b"v2".to_vec()));

        let tombstone = map.delete(key.uuid).unwrap();
        assert_eq!(tombstone.kind, "");
        assert!(!map.exists(&key.uuid).unwrap());
        assert_eq!(map.history(&key.uuid).unwrap().len(), 3);
    }

    #[test]
    fn test_update_may_create() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.update(uuid, "hello", b"fresh").unwrap();
        assert_eq!(map.read(&uuid).unwrap(), Some(b"fresh".to_vec()));
    }

    #[test]
    fn test_history_newest_first() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.put_at(Key::new(uuid, 20, "k"), Some(b"b".as_slice())).unwrap();
        map.put_at(Key::new(uuid, 30, "k"), None).unwrap();
        map.put_at(Key::new(uuid, 10, "k"), Some(b"a".as_slice())).unwrap();

        let history = map.history(&uuid).unwrap();
        assert_eq!(
            history,
            vec![(30, None), (20, Some(b"b".to_vec())), (10, Some(b"a".to_vec()))]
        );
    }

    #[test]
    fn test_closed_engine_rejects_operations() {
        let mut map = LocalMap::new();
        let uuid = Uuid::new_v4();
        assert!(matches!(map.read(&uuid), Err(MapQueueError::Closed)));
        assert!(matches!(map.create("k", b"v"), Err(MapQueueError::Closed)));

        map.open().unwrap();
        map.create("k", b"v").unwrap();
        map.close().unwrap();
        assert!(!map.is_open());
        assert!(map.is_empty());
        map.close().unwrap();
    }

    #[test]
    fn test_reopen_starts_empty() {
        let mut map = opened();
        let key = map.create("k", b"v").unwrap();
        map.close().unwrap();
        map.open().unwrap();
        assert_eq!(map.read(&key.uuid).unwrap(), None);
    }

    #[test]
    fn test_metrics() {
        let mut map = opened();
        let key = map.create("k", b"v").unwrap();
        map.delete(key.uuid).unwrap();
        map.read(&key.uuid).unwrap();
        assert_eq!(map.metrics().total_ops(), 3);
        assert_eq!(
            map.metrics().tombstones.load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_read_at_min_time_sees_nothing_later() {
        let mut map = opened();
        let uuid = Uuid::new_v4();
        map.put_at(Key::new(uuid, 5, "k"), Some(b"future".as_slice())).unwrap();
        assert_eq!(map.read_at(&uuid, i64::MIN).unwrap(), None);

        map.put_at(Key::new(uuid, i64::MIN, "k"), Some(b"origin".as_slice())).unwrap();
        assert_eq!(map.read_at(&uuid, i64::MIN).unwrap(), Some(b"origin".to_vec()));
        assert_eq!(map.read_at(&uuid, i64::MAX).unwrap(), Some(b"future".to_vec()));
        assert_eq!(map.history(&uuid).unwrap()[1].0, i64::MIN);
    }

    /// Times clustered near zero, plus the extremes of the range.
    fn any_time() -> impl Strategy<Value = Timestamp> {
        prop_oneof![
            Just(i64::MIN),
            Just(i64::MIN + 1),
            Just(i64::MAX),
            -5i64..60,
        ]
    }

    proptest! {
        #[test]
        fn prop_revisions_match_linear_scan(
            writes in proptest::collection::vec((any_time(), any::<bool>()), 1..40),
            query in any_time(),
        ) {
            let mut map = opened();
            let uuid = Uuid::new_v4();
            for (i, (time, present)) in writes.iter().enumerate() {
                let value = format!("v{}", i).into_bytes();
                let value = if *present { Some(value.as_slice()) } else { None };
                map.put_at(Key::new(uuid, *time, "k"), value).unwrap();
            }

            let history = map.history(&uuid).unwrap();
            prop_assert_eq!(history.len(), writes.len());
            prop_assert!(history.windows(2).all(|w| w[0].0 >= w[1].0));

            // newest time <= query, latest insertion on ties
            let expected = writes
                .iter()
                .enumerate()
                .filter(|(_, (time, _))| *time <= query)
                .max_by_key(|(i, (time, _))| (*time, *i))
                .and_then(|(i, (_, present))| present.then(|| format!("v{}", i).into_bytes()));
            prop_assert_eq!(map.read_at(&uuid, query).unwrap(), expected);
        }
    }
}
