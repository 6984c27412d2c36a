use std::collections::BTreeMap;

use tracing::debug;

use crate::error::StoreError;
use crate::Store;

/// Write-buffering stage over any `Store`.
///
/// Vectors written during an epoch stay in the buffer until `flush`, so a
/// whole epoch of writes can be discarded atomically with `drop_pending`
/// without touching durable storage. When the buffer outgrows its byte
/// limit it is flushed to the inner store.
#[derive(Debug)]
pub struct Flushable<S: Store> {
    inner: S,
    buffer: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    buffered_bytes: usize,
    limit: usize,
}

impl<S: Store> Flushable<S> {
    pub fn wrap(inner: S, limit: usize) -> Self {
        Flushable {
            inner,
            buffer: BTreeMap::new(),
            buffered_bytes: 0,
            limit,
        }
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn account(key: &[u8], value: Option<&[u8]>) -> usize {
        key.len() + value.map_or(0, |v| v.len())
    }
}

impl<S: Store> Store for Flushable<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(buffered) = self.buffer.get(key) {
            return Ok(buffered.clone());
        }
        self.inner.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.buffered_bytes += Self::account(key, Some(value));
        self.buffer.insert(key.to_vec(), Some(value.to_vec()));
        if self.buffered_bytes > self.limit {
            debug!(bytes = self.buffered_bytes, "flushable buffer overflow");
            self.flush()?;
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.buffered_bytes += Self::account(key, None);
        self.buffer.insert(key.to_vec(), None);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut keys = self.inner.keys_with_prefix(prefix)?;
        keys.retain(|key| !matches!(self.buffer.get(key), Some(None)));

        for (key, value) in &self.buffer {
            if key.starts_with(prefix) && value.is_some() && !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let buffer = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;
        for (key, value) in buffer {
            match value {
                Some(v) => self.inner.put(&key, &v)?,
                None => self.inner.delete(&key)?,
            }
        }
        self.inner.flush()
    }

    fn drop_pending(&mut self) {
        self.buffer.clear();
        self.buffered_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_buffered_writes_visible() {
        let mut db = Flushable::wrap(MemoryStore::new(), 1 << 20);
        db.put(b"a", b"1").unwrap();
        assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(db.buffered_bytes() > 0);
    }

    #[test]
    fn test_drop_pending_discards_buffer() {
        let mut db = Flushable::wrap(MemoryStore::new(), 1 << 20);
        db.put(b"a", b"1").unwrap();
        db.flush().unwrap();
        db.put(b"b", b"2").unwrap();

        db.drop_pending();

        assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(db.get(b"b").unwrap(), None);
        assert_eq!(db.buffered_bytes(), 0);
    }

    #[test]
    fn test_flush_reaches_inner() {
        let mut db = Flushable::wrap(MemoryStore::new(), 1 << 20);
        db.put(b"a", b"1").unwrap();
        db.flush().unwrap();

        let inner = db.into_inner();
        assert_eq!(inner.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_overflow_triggers_flush() {
        let mut db = Flushable::wrap(MemoryStore::new(), 8);
        db.put(b"abcd", b"012345678").unwrap();

        // Buffer exceeded the limit, so the write went straight through.
        assert_eq!(db.buffered_bytes(), 0);
        let inner = db.into_inner();
        assert_eq!(inner.get(b"abcd").unwrap(), Some(b"012345678".to_vec()));
    }

    #[test]
    fn test_prefix_merges_buffer_and_inner() {
        let mut db = Flushable::wrap(MemoryStore::new(), 1 << 20);
        db.put(b"H1", b"x").unwrap();
        db.flush().unwrap();
        db.put(b"H2", b"y").unwrap();
        db.delete(b"H1").unwrap();

        let keys = db.keys_with_prefix(b"H").unwrap();
        assert_eq!(keys, vec![b"H2".to_vec()]);
    }
}
