use std::hash::Hash;

use lru::LruCache;

/// LRU cache bounded by a total weight budget instead of an entry count.
///
/// Each entry carries a caller-supplied weight (typically its serialized
/// size), so memory use tracks actual vector size rather than row count.
pub struct WeightedCache<K: Hash + Eq, V> {
    entries: LruCache<K, (V, usize)>,
    total_weight: usize,
    max_weight: usize,
}

impl<K: Hash + Eq, V> WeightedCache<K, V> {
    pub fn new(max_weight: usize) -> Self {
        WeightedCache {
            entries: LruCache::unbounded(),
            total_weight: 0,
            max_weight,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(value, _)| value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Insert an entry, evicting least-recently-used entries until the
    /// budget holds. Entries heavier than the whole budget are not cached.
    pub fn insert(&mut self, key: K, value: V, weight: usize) {
        if weight > self.max_weight {
            // a stale value under the same key must not outlive the skip
            self.remove(&key);
            return;
        }

        if let Some((_, old_weight)) = self.entries.push(key, (value, weight)) {
            // push returns the displaced entry; for an existing key that is
            // the old value, which must be de-accounted.
            self.total_weight -= old_weight.1;
        }
        self.total_weight += weight;

        while self.total_weight > self.max_weight {
            match self.entries.pop_lru() {
                Some((_, (_, evicted))) => self.total_weight -= evicted,
                None => break,
            }
        }
    }

    /// Drop an entry if present.
    pub fn remove(&mut self, key: &K) {
        if let Some((_, weight)) = self.entries.pop(key) {
            self.total_weight -= weight;
        }
    }

    pub fn purge(&mut self) {
        self.entries.clear();
        self.total_weight = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> usize {
        self.total_weight
    }
}
