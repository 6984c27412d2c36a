use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Corrupted store: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Local store corruption cannot be repaired by the node itself.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StoreError::Corruption(_))
    }
}
