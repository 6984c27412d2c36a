pub mod event;
pub mod validator;

pub use event::{Event, EventId, Seq, SignedEvent, Timestamp};
pub use validator::{ValidatorId, ValidatorIdx, ValidatorSet, ValidatorSetBuilder, Weight};
