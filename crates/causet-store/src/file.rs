use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use causet_core::serialize;

use crate::error::StoreError;
use crate::Store;

/// File-backed store using a single snapshot file.
///
/// The whole committed map is rewritten atomically (tmp file + rename) on
/// every flush. A snapshot that fails to decode surfaces as a corruption
/// error, which callers treat as fatal.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl FileStore {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let data = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| StoreError::Io(e.to_string()))?;
            if bytes.is_empty() {
                BTreeMap::new()
            } else {
                serialize::from_bytes(&bytes)
                    .map_err(|e| StoreError::Corruption(e.to_string()))?
            }
        } else {
            BTreeMap::new()
        };

        Ok(FileStore {
            path,
            data,
            pending: BTreeMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the snapshot from the committed map.
    pub fn compact(&mut self) -> Result<(), StoreError> {
        self.write_snapshot()
    }

    fn write_snapshot(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let bytes = serialize::to_bytes(&self.data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| StoreError::Io(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }
}

impl Store for FileStore {
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
        self.write_snapshot()
    }

    fn drop_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("causet-store-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_reload_after_flush() {
        let path = temp_path("reload");
        let _ = fs::remove_file(&path);

        {
            let mut store = FileStore::open(&path).unwrap();
            store.put(b"key", b"value").unwrap();
            store.flush().unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(b"key").unwrap(), Some(b"value".to_vec()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_unflushed_writes_lost_on_reopen() {
        let path = temp_path("unflushed");
        let _ = fs::remove_file(&path);

        {
            let mut store = FileStore::open(&path).unwrap();
            store.put(b"durable", b"1").unwrap();
            store.flush().unwrap();
            store.put(b"staged", b"2").unwrap();
            // no flush: "staged" must not survive
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(b"durable").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"staged").unwrap(), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_corrupted_snapshot_is_reported() {
        let path = temp_path("corrupt");
        fs::write(&path, b"\xff\xfe not a snapshot").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corruption(_))));

        let _ = fs::remove_file(&path);
    }
}
