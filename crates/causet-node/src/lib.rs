//! Causet Node - admission pipeline and process wiring around the
//! vector-clock causality engine.
//!
//! The node light-checks submitted events synchronously, fans the expensive
//! hash/signature checks out to a bounded worker pool, re-imposes
//! topological order and feeds the result into the engine. Everything else
//! (gossip transport, outer consensus) plugs in through `NodeHandle` and
//! the engine's query surface.

pub mod admission;
pub mod config;
pub mod event_store;
pub mod node;

pub use config::{generate_sample_config, NodeConfig};
pub use node::{Node, NodeHandle};
