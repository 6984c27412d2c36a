use std::collections::HashMap;

use crate::crypto::PublicKey;

/// Validator identity: an Ed25519 public key.
pub type ValidatorId = PublicKey;

/// Voting weight of a validator.
pub type Weight = u64;

/// Position of a validator inside a `ValidatorSet`; indexes vector slots.
pub type ValidatorIdx = u32;

/// Immutable per-epoch mapping from validator identity to voting weight.
///
/// Members are ordered deterministically (descending weight, then identity)
/// so that slot positions agree on every node. Replaced wholesale on epoch
/// transitions, never mutated.
#[derive(Debug, Clone)]
pub struct ValidatorSet {
    members: Vec<(ValidatorId, Weight)>,
    by_id: HashMap<ValidatorId, ValidatorIdx>,
    total_weight: Weight,
}

impl ValidatorSet {
    /// Convenience constructor from (id, weight) pairs.
    pub fn from_weights<I>(weights: I) -> Self
    where
        I: IntoIterator<Item = (ValidatorId, Weight)>,
    {
        let mut builder = ValidatorSetBuilder::new();
        for (id, weight) in weights {
            builder.set(id, weight);
        }
        builder.build()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_weight(&self) -> Weight {
        self.total_weight
    }

    /// Smallest weight sum that exceeds 2/3 of the total weight.
    pub fn quorum(&self) -> Weight {
        self.total_weight * 2 / 3 + 1
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn idx_of(&self, id: &ValidatorId) -> Option<ValidatorIdx> {
        self.by_id.get(id).copied()
    }

    pub fn id_by_idx(&self, idx: ValidatorIdx) -> ValidatorId {
        self.members[idx as usize].0
    }

    pub fn weight_by_idx(&self, idx: ValidatorIdx) -> Weight {
        self.members[idx as usize].1
    }

    /// Iterate members in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ValidatorIdx, ValidatorId, Weight)> + '_ {
        self.members
            .iter()
            .enumerate()
            .map(|(i, (id, w))| (i as ValidatorIdx, *id, *w))
    }
}

/// Builder for `ValidatorSet`. Setting a zero weight removes the member.
#[derive(Debug, Default)]
pub struct ValidatorSetBuilder {
    weights: HashMap<ValidatorId, Weight>,
}

impl ValidatorSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: ValidatorId, weight: Weight) {
        if weight == 0 {
            self.weights.remove(&id);
        } else {
            self.weights.insert(id, weight);
        }
    }

    pub fn build(self) -> ValidatorSet {
        let mut members: Vec<(ValidatorId, Weight)> = self.weights.into_iter().collect();
        members.sort_by(|(a_id, a_w), (b_id, b_w)| b_w.cmp(a_w).then(a_id.cmp(b_id)));

        let by_id = members
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i as ValidatorIdx))
            .collect();
        let total_weight = members.iter().map(|(_, w)| *w).sum();

        ValidatorSet {
            members,
            by_id,
            total_weight,
        }
    }
}
