use causet_core::{EventId, Seq, Timestamp, ValidatorIdx};
use serde::{Deserialize, Serialize};

/// Approximate serialized size of one Highest-Before slot, for cache
/// weighting.
pub const HIGHEST_SLOT_BYTES: usize = 48;

/// One Highest-Before row: what an event knows about a single validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighestBeforeSlot {
    /// Highest sequence number from this validator in the causal past;
    /// 0 if the validator is unobserved.
    pub seq: Seq,
    /// The event achieving `seq`.
    pub event: EventId,
    /// Creation time of that event, for median-time queries.
    pub time: Timestamp,
    /// The causal past contains equivocation evidence for this validator.
    pub fork: bool,
}

impl HighestBeforeSlot {
    pub fn empty() -> Self {
        HighestBeforeSlot {
            seq: 0,
            event: EventId::ZERO,
            time: 0,
            fork: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seq == 0 && !self.fork
    }
}

/// Per-event vector of Highest-Before slots, one per validator.
/// Computed once when the event is admitted and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighestBefore {
    slots: Vec<HighestBeforeSlot>,
}

impl HighestBefore {
    pub fn empty(validators: usize) -> Self {
        HighestBefore {
            slots: vec![HighestBeforeSlot::empty(); validators],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, idx: ValidatorIdx) -> &HighestBeforeSlot {
        &self.slots[idx as usize]
    }

    pub(crate) fn slot_mut(&mut self, idx: ValidatorIdx) -> &mut HighestBeforeSlot {
        &mut self.slots[idx as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &HighestBeforeSlot> {
        self.slots.iter()
    }

    /// Copy with fork-affected slots collapsed to the no-safe-answer form:
    /// no sequence, no timestamp, fork flag kept. Callers that must treat
    /// equivocators conservatively read this instead of the raw vector.
    pub fn merged(&self) -> HighestBefore {
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                if slot.fork {
                    HighestBeforeSlot {
                        fork: true,
                        ..HighestBeforeSlot::empty()
                    }
                } else {
                    *slot
                }
            })
            .collect();
        HighestBefore { slots }
    }

    pub fn approx_bytes(&self) -> usize {
        self.slots.len() * HIGHEST_SLOT_BYTES
    }
}

/// Per-event vector of Lowest-After sequence numbers, one per validator;
/// 0 until some event by that validator observes this one.
///
/// Unlike Highest-Before this vector is mutated after creation: each slot
/// is written at most once, by the first (hence lowest-seq) observing event
/// in topological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowestAfter {
    slots: Vec<Seq>,
}

impl LowestAfter {
    pub fn empty(validators: usize) -> Self {
        LowestAfter {
            slots: vec![0; validators],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, idx: ValidatorIdx) -> Seq {
        self.slots[idx as usize]
    }

    /// Record `seq` if the slot is still unset; returns whether it was
    /// written. Used by the pruned ancestor walk: a set slot means the
    /// subtree below was already visited by an earlier event of the same
    /// creator.
    pub fn visit(&mut self, idx: ValidatorIdx, seq: Seq) -> bool {
        let slot = &mut self.slots[idx as usize];
        if *slot == 0 {
            *slot = seq;
            true
        } else {
            false
        }
    }

    pub fn approx_bytes(&self) -> usize {
        self.slots.len() * 4 + 8
    }
}
