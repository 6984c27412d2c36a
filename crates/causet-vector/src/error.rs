use causet_core::{CoreError, EventId, ValidatorId};
use causet_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Engine not initialized; reset must run first")]
    NotInitialized,

    #[error("Unknown event: {0}")]
    UnknownEvent(EventId),

    #[error("Event already indexed: {0}")]
    AlreadyIndexed(EventId),

    #[error("Missing vector for parent {0}: admission order violated")]
    MissingParentVector(EventId),

    #[error("Empty validator set")]
    EmptyValidatorSet,

    #[error("Event creator is not in the validator set: {0}")]
    UnknownCreator(ValidatorId),

    #[error("Unknown validator: {0}")]
    UnknownValidator(ValidatorId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] CoreError),
}

impl VectorError {
    /// Consistency and storage errors leave the engine in a state that
    /// cannot be trusted; they are routed to the fatal sink and the
    /// surrounding process is expected to halt. Lookup errors from queries
    /// (unknown event or validator identifier) only surface to the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            VectorError::MissingParentVector(_)
                | VectorError::EmptyValidatorSet
                | VectorError::UnknownCreator(_)
                | VectorError::Store(_)
                | VectorError::Serialization(_)
        )
    }
}
