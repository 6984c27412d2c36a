use std::sync::{Mutex, MutexGuard};

use causet_core::{serialize, EventId};
use causet_store::{table, Flushable, Store, WeightedCache};

use crate::engine::EngineConfig;
use crate::error::VectorError;
use crate::vectors::{HighestBefore, LowestAfter};

const HIGHEST_BEFORE: u8 = b'H';
const LOWEST_AFTER: u8 = b'L';

/// Persistence and caching for event vectors.
///
/// Both tables live behind the flushable stage, so an epoch's worth of
/// writes can be dropped before they reach durable storage. Caches are
/// filled lazily on read; Lowest-After cache entries are invalidated on
/// write since that vector mutates after creation.
pub(crate) struct VectorStore<S: Store> {
    db: Flushable<S>,
    highest_cache: Mutex<WeightedCache<EventId, HighestBefore>>,
    lowest_cache: Mutex<WeightedCache<EventId, LowestAfter>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: Store> VectorStore<S> {
    pub fn new(db: S, cfg: &EngineConfig) -> Self {
        VectorStore {
            db: Flushable::wrap(db, cfg.staging_limit_bytes),
            highest_cache: Mutex::new(WeightedCache::new(cfg.highest_cache_bytes)),
            lowest_cache: Mutex::new(WeightedCache::new(cfg.lowest_cache_bytes)),
        }
    }

    pub fn highest_before(&self, id: &EventId) -> Result<Option<HighestBefore>, VectorError> {
        if let Some(hb) = lock(&self.highest_cache).get(id) {
            return Ok(Some(hb.clone()));
        }
        let Some(bytes) = self.db.get(&table::key(HIGHEST_BEFORE, id.as_bytes()))? else {
            return Ok(None);
        };
        let hb: HighestBefore = serialize::from_bytes(&bytes)?;
        let weight = hb.approx_bytes();
        lock(&self.highest_cache).insert(*id, hb.clone(), weight);
        Ok(Some(hb))
    }

    pub fn set_highest_before(
        &mut self,
        id: &EventId,
        hb: &HighestBefore,
    ) -> Result<(), VectorError> {
        let bytes = serialize::to_bytes(hb)?;
        self.db.put(&table::key(HIGHEST_BEFORE, id.as_bytes()), &bytes)?;
        Ok(())
    }

    pub fn lowest_after(&self, id: &EventId) -> Result<Option<LowestAfter>, VectorError> {
        if let Some(la) = lock(&self.lowest_cache).get(id) {
            return Ok(Some(la.clone()));
        }
        let Some(bytes) = self.db.get(&table::key(LOWEST_AFTER, id.as_bytes()))? else {
            return Ok(None);
        };
        let la: LowestAfter = serialize::from_bytes(&bytes)?;
        let weight = la.approx_bytes();
        lock(&self.lowest_cache).insert(*id, la.clone(), weight);
        Ok(Some(la))
    }

    pub fn set_lowest_after(&mut self, id: &EventId, la: &LowestAfter) -> Result<(), VectorError> {
        let bytes = serialize::to_bytes(la)?;
        self.db.put(&table::key(LOWEST_AFTER, id.as_bytes()), &bytes)?;
        lock(&self.lowest_cache).remove(id);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), VectorError> {
        self.db.flush()?;
        Ok(())
    }

    /// Discard unflushed writes; cached entries may refer to them, so the
    /// caches are purged as well.
    pub fn drop_pending(&mut self) {
        self.db.drop_pending();
        lock(&self.highest_cache).purge();
        lock(&self.lowest_cache).purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causet_store::MemoryStore;

    use crate::vectors::HighestBeforeSlot;

    fn vs() -> VectorStore<MemoryStore> {
        VectorStore::new(MemoryStore::new(), &EngineConfig::lite())
    }

    fn some_id(tag: u8) -> EventId {
        EventId(causet_core::hash_blake3(&[tag]))
    }

    #[test]
    fn test_highest_before_roundtrip() {
        let mut store = vs();
        let id = some_id(1);
        let mut hb = HighestBefore::empty(3);
        *hb.slot_mut(0) = HighestBeforeSlot {
            seq: 4,
            event: some_id(9),
            time: 42,
            fork: false,
        };

        store.set_highest_before(&id, &hb).unwrap();
        assert_eq!(store.highest_before(&id).unwrap(), Some(hb.clone()));
        // second read is served by the cache
        assert_eq!(store.highest_before(&id).unwrap(), Some(hb));
    }

    #[test]
    fn test_lowest_after_update_invalidates_cache() {
        let mut store = vs();
        let id = some_id(2);

        let mut la = LowestAfter::empty(3);
        store.set_lowest_after(&id, &la).unwrap();
        assert_eq!(store.lowest_after(&id).unwrap().unwrap().get(1), 0);

        la.visit(1, 7);
        store.set_lowest_after(&id, &la).unwrap();
        assert_eq!(store.lowest_after(&id).unwrap().unwrap().get(1), 7);
    }

    #[test]
    fn test_drop_pending_forgets_unflushed() {
        let mut store = vs();
        let id = some_id(3);
        store
            .set_highest_before(&id, &HighestBefore::empty(2))
            .unwrap();
        // read once so the cache holds it too
        assert!(store.highest_before(&id).unwrap().is_some());

        store.drop_pending();
        assert!(store.highest_before(&id).unwrap().is_none());
    }

    #[test]
    fn test_flushed_survives_drop() {
        let mut store = vs();
        let id = some_id(4);
        store
            .set_highest_before(&id, &HighestBefore::empty(2))
            .unwrap();
        store.flush().unwrap();
        store.drop_pending();
        assert!(store.highest_before(&id).unwrap().is_some());
    }
}
