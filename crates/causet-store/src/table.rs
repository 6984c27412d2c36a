//! Table-tag key namespacing.
//!
//! Several logical tables share one physical store; each table prefixes its
//! keys with a one-byte tag, so a table can be scanned with a prefix query.

/// Build the physical key for `(tag, key)`.
pub fn key(tag: u8, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + key.len());
    out.push(tag);
    out.extend_from_slice(key);
    out
}

/// The prefix covering a whole table.
pub fn prefix(tag: u8) -> [u8; 1] {
    [tag]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, Store};

    #[test]
    fn test_tables_do_not_collide() {
        let mut store = MemoryStore::new();
        store.put(&key(b'H', b"id"), b"highest").unwrap();
        store.put(&key(b'L', b"id"), b"lowest").unwrap();

        assert_eq!(
            store.get(&key(b'H', b"id")).unwrap(),
            Some(b"highest".to_vec())
        );
        assert_eq!(
            store.get(&key(b'L', b"id")).unwrap(),
            Some(b"lowest".to_vec())
        );
    }

    #[test]
    fn test_prefix_scans_one_table() {
        let mut store = MemoryStore::new();
        store.put(&key(b'H', b"a"), b"1").unwrap();
        store.put(&key(b'H', b"b"), b"2").unwrap();
        store.put(&key(b'L', b"a"), b"3").unwrap();

        let keys = store.keys_with_prefix(&prefix(b'H')).unwrap();
        assert_eq!(keys.len(), 2);
    }
}
