//! Causet Core - foundational types for the DAG causality engine
//!
//! This crate provides hashes, keys, signatures, events, validator sets and
//! deterministic serialization shared by the rest of the workspace.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{hash_blake3, sign, verify, Hash, KeyPair, PublicKey, SecretKey, Sig};
pub use error::CoreError;
pub use types::*;
