use std::collections::HashMap;

use causet_core::{EventId, Seq, ValidatorIdx};

/// Registry of every (creator, seq) pair admitted in the current epoch.
///
/// Honest validators emit exactly one event per sequence number, so their
/// rows stay conflict-free and slot merges take the fast path. Once a second
/// event appears for an occupied sequence number the validator is marked
/// conflicting and merges involving it fall back to self-parent lineage
/// checks.
#[derive(Debug, Default)]
pub struct BranchRegistry {
    chains: Vec<BranchChain>,
}

#[derive(Debug, Default)]
struct BranchChain {
    first_seen: HashMap<Seq, EventId>,
    conflicting: bool,
}

impl BranchRegistry {
    pub fn new(validators: usize) -> Self {
        BranchRegistry {
            chains: (0..validators).map(|_| BranchChain::default()).collect(),
        }
    }

    /// Record an admitted event; returns true when this reveals equivocation
    /// by the creator.
    pub fn record(&mut self, idx: ValidatorIdx, seq: Seq, id: EventId) -> bool {
        let chain = &mut self.chains[idx as usize];
        match chain.first_seen.get(&seq) {
            Some(existing) if *existing != id => {
                chain.conflicting = true;
                true
            }
            Some(_) => false,
            None => {
                chain.first_seen.insert(seq, id);
                false
            }
        }
    }

    /// Whether the validator has ever produced two events with the same
    /// sequence number in this epoch.
    pub fn is_conflicting(&self, idx: ValidatorIdx) -> bool {
        self.chains[idx as usize].conflicting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causet_core::{hash_blake3, EventId};

    fn id(tag: &[u8]) -> EventId {
        EventId(hash_blake3(tag))
    }

    #[test]
    fn test_honest_chain_stays_clean() {
        let mut reg = BranchRegistry::new(2);
        assert!(!reg.record(0, 1, id(b"a1")));
        assert!(!reg.record(0, 2, id(b"a2")));
        assert!(!reg.is_conflicting(0));
    }

    #[test]
    fn test_same_event_twice_is_not_a_fork() {
        let mut reg = BranchRegistry::new(1);
        assert!(!reg.record(0, 1, id(b"a1")));
        assert!(!reg.record(0, 1, id(b"a1")));
        assert!(!reg.is_conflicting(0));
    }

    #[test]
    fn test_conflicting_seq_marks_validator() {
        let mut reg = BranchRegistry::new(2);
        reg.record(1, 3, id(b"b3"));
        assert!(reg.record(1, 3, id(b"b3-prime")));
        assert!(reg.is_conflicting(1));
        assert!(!reg.is_conflicting(0));
    }
}
