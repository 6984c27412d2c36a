//! Causet Store - key-value backing store for DAG vectors
//!
//! A small storage stack: the `Store` trait with staged (unflushed) writes,
//! an in-memory and a file-backed implementation, a write-buffering wrapper
//! for epoch-droppable staging, table-tag key namespacing and a size-weighted
//! LRU cache for derived vector data.

pub mod cache;
pub mod error;
pub mod file;
pub mod flushable;
pub mod memory;
pub mod table;

pub use cache::WeightedCache;
pub use error::StoreError;
pub use file::FileStore;
pub use flushable::Flushable;
pub use memory::MemoryStore;

/// Key-value store with staged writes.
///
/// `put`/`delete` land in a pending overlay that `get` already observes;
/// `flush` makes the overlay durable, `drop_pending` discards it.
pub trait Store: Send {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Stage a key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Stage a deletion.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// All keys with a given prefix, pending overlay included.
    fn keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StoreError>;

    /// Make staged writes durable.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Discard staged writes.
    fn drop_pending(&mut self);

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}
