use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use causet_core::{EventId, SignedEvent, ValidatorId, ValidatorSet};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Event has zero sequence number")]
    ZeroSeq,

    #[error("Unknown creator: {0}")]
    UnknownCreator(ValidatorId),

    #[error("Duplicate parent reference")]
    DuplicateParent,

    #[error("Event id does not match content")]
    IdMismatch,

    #[error("Invalid signature: {0}")]
    InvalidSignature(causet_core::CoreError),
}

/// Cheap synchronous admission checks: structure and creator membership.
/// Signature and hash verification is left to the heavy checker.
pub fn light_check(
    signed: &SignedEvent,
    validators: &ValidatorSet,
) -> Result<(), AdmissionError> {
    let event = &signed.event;
    if event.seq == 0 {
        return Err(AdmissionError::ZeroSeq);
    }
    if !validators.contains(&event.creator) {
        return Err(AdmissionError::UnknownCreator(event.creator));
    }
    let mut seen: HashSet<&EventId> = HashSet::new();
    for parent in &event.parents {
        if !seen.insert(parent) {
            return Err(AdmissionError::DuplicateParent);
        }
    }
    Ok(())
}

/// Expensive admission checks: content hash and signature. The node runs
/// this on a blocking worker; the import path calls it inline.
pub fn heavy_check(signed: &SignedEvent) -> Result<(), AdmissionError> {
    match signed.event.verify_id() {
        Ok(true) => {}
        Ok(false) => return Err(AdmissionError::IdMismatch),
        Err(e) => return Err(AdmissionError::InvalidSignature(e)),
    }
    signed.verify().map_err(AdmissionError::InvalidSignature)
}

/// Outcome of a heavy check, funneled back to the node loop.
pub struct CheckedEvent {
    pub signed: SignedEvent,
    pub result: Result<(), AdmissionError>,
}

/// Bounded pool of heavy-check workers. Each submission runs hash and
/// signature verification off the runtime threads and reports exactly once
/// on the results channel; completion order is arbitrary, so the caller
/// re-imposes topological order before events reach the engine.
pub struct HeavyChecker {
    permits: Arc<Semaphore>,
    results: mpsc::Sender<CheckedEvent>,
}

impl HeavyChecker {
    pub fn new(workers: usize, results: mpsc::Sender<CheckedEvent>) -> Self {
        HeavyChecker {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            results,
        }
    }

    pub fn submit(&self, signed: SignedEvent) -> JoinHandle<()> {
        let permits = Arc::clone(&self.permits);
        let results = self.results.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let outcome = tokio::task::spawn_blocking(move || {
                let result = heavy_check(&signed);
                CheckedEvent { signed, result }
            })
            .await;
            if let Ok(checked) = outcome {
                let _ = results.send(checked).await;
            }
        })
    }
}

/// Buffers checked events until all their parents have been admitted and
/// releases them in topological order.
#[derive(Default)]
pub struct Orderer {
    admitted: HashSet<EventId>,
    pending: HashMap<EventId, SignedEvent>,
    waiting: HashMap<EventId, Vec<EventId>>,
}

impl Orderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an already-admitted event id, e.g. when rebuilding after a
    /// restart.
    pub fn mark_admitted(&mut self, id: EventId) {
        self.admitted.insert(id);
    }

    /// Offer a checked event; returns the events that became deliverable,
    /// parents always before children.
    pub fn offer(&mut self, signed: SignedEvent) -> Vec<SignedEvent> {
        let id = signed.event.id;
        if self.admitted.contains(&id) || self.pending.contains_key(&id) {
            return Vec::new();
        }

        let missing: Vec<EventId> = signed
            .event
            .parents
            .iter()
            .filter(|p| !self.admitted.contains(*p))
            .copied()
            .collect();
        if !missing.is_empty() {
            debug!(event = %id, missing = missing.len(), "event buffered until parents arrive");
            for parent in missing {
                self.waiting.entry(parent).or_default().push(id);
            }
            self.pending.insert(id, signed);
            return Vec::new();
        }

        let mut ready = vec![signed];
        self.admitted.insert(id);

        // Cascade: each delivery may unblock buffered children.
        let mut frontier = vec![id];
        while let Some(delivered) = frontier.pop() {
            let Some(children) = self.waiting.remove(&delivered) else {
                continue;
            };
            for child in children {
                let deliverable = self
                    .pending
                    .get(&child)
                    .is_some_and(|s| s.event.parents.iter().all(|p| self.admitted.contains(p)));
                if !deliverable {
                    continue;
                }
                if let Some(signed) = self.pending.remove(&child) {
                    self.admitted.insert(child);
                    ready.push(signed);
                    frontier.push(child);
                }
            }
        }
        ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
