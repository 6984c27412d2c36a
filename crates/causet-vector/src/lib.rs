//! Causet Vector - the DAG vector-clock causality engine
//!
//! For every admitted event the engine computes per-validator summary
//! vectors: Highest-Before (the highest sequence number from each validator
//! observable in the event's causal past, with fork evidence) and
//! Lowest-After (the lowest sequence number from each validator known to
//! have the event in its past). Those vectors answer the questions the
//! outer consensus depends on in O(validators) instead of a graph walk:
//! quorum-weighted forkless causality, equivocation detection and the
//! fork-tolerant median timestamp of an event's past.

pub mod branches;
pub mod engine;
pub mod error;
pub mod vectors;
mod vstore;

pub use engine::{Engine, EngineConfig, EventLookup, FatalSink};
pub use error::VectorError;
pub use vectors::{HighestBefore, HighestBeforeSlot, LowestAfter};
