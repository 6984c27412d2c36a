use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{hash_blake3, sign, verify, Hash, SecretKey, Sig};
use crate::error::CoreError;
use crate::serialize;
use crate::types::validator::ValidatorId;

/// Per-creator monotonic sequence number, 1-based. 0 means "none".
pub type Seq = u32;

/// Event creation time, in nanoseconds since the Unix epoch.
pub type Timestamp = u64;

/// Event identifier: the Blake3 content hash of the event.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct EventId(pub Hash);

impl EventId {
    pub const ZERO: EventId = EventId(Hash::ZERO);

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(EventId(Hash::from_hex(s)?))
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A DAG node: a batch of transactions (referenced by payload hash) plus
/// references to causally-prior events from any validator.
///
/// The first parent is the self-parent (the creator's previous event) for
/// every event with `seq > 1`. Parents must be admitted before the event is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub creator: ValidatorId,
    pub seq: Seq,
    pub creation_time: Timestamp,
    pub parents: Vec<EventId>,
    pub payload_hash: Hash,
}

impl Event {
    /// Build an event, deriving its identifier from the content.
    pub fn new(
        creator: ValidatorId,
        seq: Seq,
        creation_time: Timestamp,
        parents: Vec<EventId>,
        payload_hash: Hash,
    ) -> Result<Self, CoreError> {
        if seq == 0 {
            return Err(CoreError::MalformedEvent("seq must be 1-based".into()));
        }
        let mut event = Event {
            id: EventId::ZERO,
            creator,
            seq,
            creation_time,
            parents,
            payload_hash,
        };
        event.id = event.content_hash()?;
        Ok(event)
    }

    /// The creator's previous event, when there is one.
    pub fn self_parent(&self) -> Option<&EventId> {
        if self.seq > 1 {
            self.parents.first()
        } else {
            None
        }
    }

    /// Content hash over everything except the identifier itself.
    pub fn content_hash(&self) -> Result<EventId, CoreError> {
        let bytes = serialize::to_bytes(&(
            &self.creator,
            self.seq,
            self.creation_time,
            &self.parents,
            &self.payload_hash,
        ))?;
        Ok(EventId(hash_blake3(&bytes)))
    }

    /// Check that the identifier matches the content.
    pub fn verify_id(&self) -> Result<bool, CoreError> {
        Ok(self.content_hash()? == self.id)
    }
}

/// An event together with its creator's signature over the identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEvent {
    pub event: Event,
    pub sig: Sig,
}

impl SignedEvent {
    pub fn sign(event: Event, secret: &SecretKey) -> Self {
        let sig = sign(secret, event.id.as_bytes());
        SignedEvent { event, sig }
    }

    pub fn verify(&self) -> Result<(), CoreError> {
        verify(&self.event.creator, self.event.id.as_bytes(), &self.sig)
    }
}
