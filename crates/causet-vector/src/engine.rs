use std::collections::HashSet;
use std::sync::Arc;

use causet_core::{
    Event, EventId, Timestamp, ValidatorId, ValidatorIdx, ValidatorSet, Weight,
};
use causet_store::Store;
use tracing::{debug, info, warn};

use crate::branches::BranchRegistry;
use crate::error::VectorError;
use crate::vectors::{HighestBefore, HighestBeforeSlot, LowestAfter};
use crate::vstore::VectorStore;

/// Resolves event identifiers to events; supplied by the event store at
/// every reset. Must resolve every admitted event, including the one
/// currently being added.
pub type EventLookup = Arc<dyn Fn(&EventId) -> Option<Event> + Send + Sync>;

/// Receives unrecoverable errors (violated admission order, storage
/// corruption). The surrounding process is expected to halt; the engine
/// offers no recovery path.
pub type FatalSink = Arc<dyn Fn(&VectorError) + Send + Sync>;

/// Cache and staging sizes of the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub highest_cache_bytes: usize,
    pub lowest_cache_bytes: usize,
    pub staging_limit_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            highest_cache_bytes: 4 << 20,
            lowest_cache_bytes: 2 << 20,
            staging_limit_bytes: 10 << 20,
        }
    }
}

impl EngineConfig {
    /// Small sizes for tests.
    pub fn lite() -> Self {
        EngineConfig {
            highest_cache_bytes: 16 << 10,
            lowest_cache_bytes: 16 << 10,
            staging_limit_bytes: 1 << 20,
        }
    }
}

/// Per-epoch state, replaced wholesale by `reset` so epochs can never bleed
/// into each other.
struct EpochContext<S: Store> {
    validators: ValidatorSet,
    vectors: VectorStore<S>,
    lookup: EventLookup,
    branches: BranchRegistry,
}

/// The vector-clock causality engine.
///
/// Single writer: `add` and `reset` take `&mut self` and must observe
/// topological admission order (all parents before the child). Queries take
/// `&self` and may run concurrently with each other.
pub struct Engine<S: Store> {
    cfg: EngineConfig,
    crit: FatalSink,
    epoch: Option<EpochContext<S>>,
}

impl<S: Store> Engine<S> {
    pub fn new(crit: FatalSink, cfg: EngineConfig) -> Self {
        Engine {
            cfg,
            crit,
            epoch: None,
        }
    }

    /// Rebind the engine to a new validator set, a fresh backing store and a
    /// new event lookup. Unflushed writes of the previous epoch are dropped
    /// and never become visible again; caches and fork evidence start empty.
    pub fn reset(&mut self, validators: ValidatorSet, store: S, lookup: EventLookup) {
        let n = validators.len();
        self.epoch = Some(EpochContext {
            branches: BranchRegistry::new(n),
            vectors: VectorStore::new(store, &self.cfg),
            validators,
            lookup,
        });
        info!(validators = n, "vector engine reset");
    }

    /// Compute and persist the vectors of a newly admitted event.
    ///
    /// The event must have passed admission checks, its parents must already
    /// be indexed, and `lookup` must resolve it.
    pub fn add(&mut self, event: &Event) -> Result<(), VectorError> {
        let res = self.add_inner(event);
        self.report(res)
    }

    fn add_inner(&mut self, e: &Event) -> Result<(), VectorError> {
        let ctx = self.epoch.as_mut().ok_or(VectorError::NotInitialized)?;
        if ctx.validators.is_empty() {
            return Err(VectorError::EmptyValidatorSet);
        }
        let creator_idx = ctx
            .validators
            .idx_of(&e.creator)
            .ok_or(VectorError::UnknownCreator(e.creator))?;
        if ctx.vectors.highest_before(&e.id)?.is_some() {
            return Err(VectorError::AlreadyIndexed(e.id));
        }

        if ctx.branches.record(creator_idx, e.seq, e.id) {
            warn!(creator = %e.creator, seq = e.seq, "validator equivocation observed");
        }

        let n = ctx.validators.len();
        let mut hb = HighestBefore::empty(n);

        for pid in &e.parents {
            let parent_hb = ctx
                .vectors
                .highest_before(pid)?
                .ok_or(VectorError::MissingParentVector(*pid))?;
            for idx in 0..n as ValidatorIdx {
                let merged = Self::merge_slot(&*ctx, idx, hb.slot(idx), parent_hb.slot(idx))?;
                *hb.slot_mut(idx) = merged;
            }
        }

        // The event supersedes whatever it inherited about its own creator,
        // but an inherited creator slot that is not on the event's own
        // self-parent chain is fork evidence.
        let inherited = *hb.slot(creator_idx);
        let mut fork = inherited.fork;
        if inherited.seq >= e.seq {
            fork = true;
        } else if inherited.seq > 0 && ctx.branches.is_conflicting(creator_idx) {
            match e.self_parent() {
                Some(sp) => {
                    let sp_slot = HighestBeforeSlot {
                        seq: e.seq - 1,
                        event: *sp,
                        time: 0,
                        fork: false,
                    };
                    fork |= !Self::same_branch(&*ctx, &inherited, &sp_slot)?;
                }
                None => fork = true,
            }
        }
        *hb.slot_mut(creator_idx) = HighestBeforeSlot {
            seq: e.seq,
            event: e.id,
            time: e.creation_time,
            fork,
        };

        ctx.vectors.set_highest_before(&e.id, &hb)?;

        let mut own_la = LowestAfter::empty(n);
        own_la.visit(creator_idx, e.seq);
        ctx.vectors.set_lowest_after(&e.id, &own_la)?;

        // Pruned ancestor walk: record this event in the Lowest-After of
        // every ancestor whose slot for the creator is still unset. A set
        // slot means an earlier event of the same creator already covered
        // that subtree, so the walk stops there.
        let mut stack: Vec<EventId> = e.parents.clone();
        let mut seen: HashSet<EventId> = HashSet::new();
        while let Some(pid) = stack.pop() {
            if !seen.insert(pid) {
                continue;
            }
            let mut la = ctx
                .vectors
                .lowest_after(&pid)?
                .ok_or(VectorError::MissingParentVector(pid))?;
            if la.visit(creator_idx, e.seq) {
                ctx.vectors.set_lowest_after(&pid, &la)?;
                let ancestor = (ctx.lookup)(&pid).ok_or(VectorError::UnknownEvent(pid))?;
                stack.extend(ancestor.parents.iter().copied());
            }
        }

        debug!(event = %e.id, creator = %e.creator, seq = e.seq, "event vectors computed");
        Ok(())
    }

    /// Merge one validator slot of a parent vector into the accumulator.
    fn merge_slot(
        ctx: &EpochContext<S>,
        idx: ValidatorIdx,
        acc: &HighestBeforeSlot,
        other: &HighestBeforeSlot,
    ) -> Result<HighestBeforeSlot, VectorError> {
        let inherited_fork = acc.fork || other.fork;
        let mut out = if acc.seq == 0 {
            *other
        } else if other.seq == 0 {
            *acc
        } else if acc.seq == other.seq {
            let mut slot = *acc;
            if acc.event != other.event {
                // two distinct events with one sequence number: equivocation
                slot.fork = true;
            }
            slot
        } else {
            let (lo, hi) = if acc.seq < other.seq {
                (acc, other)
            } else {
                (other, acc)
            };
            let mut slot = *hi;
            if ctx.branches.is_conflicting(idx) && !Self::same_branch(ctx, lo, hi)? {
                slot.fork = true;
            }
            slot
        };
        out.fork |= inherited_fork;
        Ok(out)
    }

    /// Whether `lo` is an ancestor of `hi` on the creator's own chain,
    /// decided by walking `hi`'s self-parent chain down to `lo`'s sequence
    /// number. Only runs for validators already known to equivocate.
    fn same_branch(
        ctx: &EpochContext<S>,
        lo: &HighestBeforeSlot,
        hi: &HighestBeforeSlot,
    ) -> Result<bool, VectorError> {
        let mut cursor = hi.event;
        let mut seq = hi.seq;
        while seq > lo.seq {
            let event = (ctx.lookup)(&cursor).ok_or(VectorError::UnknownEvent(cursor))?;
            match event.self_parent() {
                Some(parent) => {
                    cursor = *parent;
                    seq -= 1;
                }
                None => return Ok(false),
            }
        }
        Ok(cursor == lo.event)
    }

    /// Decide whether `x` is irreversibly caused by `y`: a quorum of
    /// fork-free validators must have events that both observe `y` and are
    /// observed by `x`.
    pub fn forkless_cause(&self, x: &EventId, y: &EventId) -> Result<bool, VectorError> {
        let res = self.forkless_cause_inner(x, y);
        self.report(res)
    }

    fn forkless_cause_inner(&self, x: &EventId, y: &EventId) -> Result<bool, VectorError> {
        let ctx = self.ctx()?;
        if x == y {
            // an event causes itself, but it must be known
            return match ctx.vectors.highest_before(x)? {
                Some(_) => Ok(true),
                None => Err(VectorError::UnknownEvent(*x)),
            };
        }

        let hb = ctx
            .vectors
            .highest_before(x)?
            .ok_or(VectorError::UnknownEvent(*x))?;
        let la = ctx
            .vectors
            .lowest_after(y)?
            .ok_or(VectorError::UnknownEvent(*y))?;

        let mut yes: Weight = 0;
        for (idx, _, weight) in ctx.validators.iter() {
            let slot = hb.slot(idx);
            let after = la.get(idx);
            if !slot.fork && after != 0 && slot.seq >= after {
                yes += weight;
            }
        }
        Ok(yes >= ctx.validators.quorum())
    }

    /// Fork-tolerant weighted median of the creation times observed in the
    /// event's causal past. Deterministic for a fixed DAG: slots sort by
    /// (time, validator index), so sibling insertion order cannot matter.
    pub fn median_time(
        &self,
        id: &EventId,
        default_time: Timestamp,
    ) -> Result<Timestamp, VectorError> {
        let res = self.median_time_inner(id, default_time);
        self.report(res)
    }

    fn median_time_inner(
        &self,
        id: &EventId,
        default_time: Timestamp,
    ) -> Result<Timestamp, VectorError> {
        let ctx = self.ctx()?;
        let hb = ctx
            .vectors
            .highest_before(id)?
            .ok_or(VectorError::UnknownEvent(*id))?;

        let mut points: Vec<(Timestamp, ValidatorIdx, Weight)> = ctx
            .validators
            .iter()
            .map(|(idx, _, weight)| {
                let slot = hb.slot(idx);
                let time = if slot.seq == 0 || slot.fork {
                    default_time
                } else {
                    slot.time
                };
                (time, idx, weight)
            })
            .collect();
        points.sort_by_key(|(time, idx, _)| (*time, *idx));

        // smallest integer weight that reaches half of the total
        let median_weight = ctx.validators.total_weight().div_ceil(2);
        let mut acc: Weight = 0;
        for (time, _, weight) in &points {
            acc += weight;
            if acc >= median_weight {
                return Ok(*time);
            }
        }
        Ok(default_time)
    }

    /// The event's Highest-Before vector as stored.
    pub fn highest_before(&self, id: &EventId) -> Result<HighestBefore, VectorError> {
        let res = self.ctx().and_then(|ctx| {
            ctx.vectors
                .highest_before(id)?
                .ok_or(VectorError::UnknownEvent(*id))
        });
        self.report(res)
    }

    /// The event's Highest-Before vector with fork-affected slots collapsed
    /// into the conservative no-safe-answer form.
    pub fn get_merged_highest_before(&self, id: &EventId) -> Result<HighestBefore, VectorError> {
        Ok(self.highest_before(id)?.merged())
    }

    /// The event's Lowest-After vector as stored (it may still gain entries
    /// as later events arrive).
    pub fn lowest_after(&self, id: &EventId) -> Result<LowestAfter, VectorError> {
        let res = self.ctx().and_then(|ctx| {
            ctx.vectors
                .lowest_after(id)?
                .ok_or(VectorError::UnknownEvent(*id))
        });
        self.report(res)
    }

    /// Whether the event's causal past contains equivocation evidence for
    /// the given validator.
    pub fn fork_detected(
        &self,
        id: &EventId,
        validator: &ValidatorId,
    ) -> Result<bool, VectorError> {
        let res = self.ctx().and_then(|ctx| {
            let idx = ctx
                .validators
                .idx_of(validator)
                .ok_or(VectorError::UnknownValidator(*validator))?;
            let hb = ctx
                .vectors
                .highest_before(id)?
                .ok_or(VectorError::UnknownEvent(*id))?;
            Ok(hb.slot(idx).fork)
        });
        self.report(res)
    }

    /// Whether the event has vectors in the current epoch.
    pub fn contains(&self, id: &EventId) -> Result<bool, VectorError> {
        let res = self
            .ctx()
            .and_then(|ctx| Ok(ctx.vectors.highest_before(id)?.is_some()));
        self.report(res)
    }

    pub fn validators(&self) -> Option<&ValidatorSet> {
        self.epoch.as_ref().map(|ctx| &ctx.validators)
    }

    /// Push staged vector writes to durable storage.
    pub fn flush(&mut self) -> Result<(), VectorError> {
        let res = match self.epoch.as_mut() {
            Some(ctx) => ctx.vectors.flush(),
            None => Err(VectorError::NotInitialized),
        };
        self.report(res)
    }

    /// Discard staged vector writes (and the caches that may refer to them).
    pub fn drop_pending(&mut self) {
        if let Some(ctx) = self.epoch.as_mut() {
            ctx.vectors.drop_pending();
        }
    }

    fn ctx(&self) -> Result<&EpochContext<S>, VectorError> {
        self.epoch.as_ref().ok_or(VectorError::NotInitialized)
    }

    fn report<T>(&self, res: Result<T, VectorError>) -> Result<T, VectorError> {
        if let Err(ref err) = res {
            if err.is_fatal() {
                (self.crit)(err);
            }
        }
        res
    }
}
