use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::Store;

/// In-memory store: a committed BTreeMap plus a pending overlay.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(pending) = self.pending.get(key) {
            return Ok(pending.clone());
        }
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut keys: Vec<Vec<u8>> = self
            .data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| !matches!(self.pending.get(*key), Some(None)))
            .cloned()
            .collect();

        for (key, value) in &self.pending {
            if key.starts_with(prefix) && value.is_some() && !self.data.contains_key(key) {
                keys.push(key.clone());
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut self.pending);
        for (key, value) in pending {
            match value {
                Some(v) => {
                    self.data.insert(key, v);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn drop_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut store = MemoryStore::new();

        store.put(b"key1", b"value1").unwrap();
        store.flush().unwrap();

        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(store.exists(b"key1").unwrap());
        assert!(!store.exists(b"key2").unwrap());
    }

    #[test]
    fn test_pending_visible_before_flush() {
        let mut store = MemoryStore::new();

        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        store.drop_pending();
        assert_eq!(store.get(b"key1").unwrap(), None);
    }

    #[test]
    fn test_delete() {
        let mut store = MemoryStore::new();

        store.put(b"key1", b"value1").unwrap();
        store.flush().unwrap();

        store.delete(b"key1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), None);

        store.drop_pending();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
    }

    #[test]
    fn test_prefix_query() {
        let mut store = MemoryStore::new();

        store.put(b"H:1", b"a").unwrap();
        store.put(b"H:2", b"b").unwrap();
        store.put(b"L:1", b"c").unwrap();
        store.flush().unwrap();
        store.put(b"H:3", b"d").unwrap();

        let keys = store.keys_with_prefix(b"H:").unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&b"H:3".to_vec()));
    }

    #[test]
    fn test_overwrite() {
        let mut store = MemoryStore::new();

        store.put(b"key", b"value1").unwrap();
        store.flush().unwrap();

        store.put(b"key", b"value2").unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value2".to_vec()));

        store.flush().unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value2".to_vec()));
    }
}
