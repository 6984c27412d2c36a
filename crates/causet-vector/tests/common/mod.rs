use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use causet_core::{
    hash_blake3, Event, EventId, PublicKey, Seq, Timestamp, ValidatorId, ValidatorSet, Weight,
};
use causet_store::MemoryStore;
use causet_vector::{Engine, EngineConfig, EventLookup, VectorError};

/// Test harness: a shared event map serving the engine's lookup, plus
/// helpers to mint events (honest or equivocating) and feed them in.
pub struct DagBuilder {
    pub engine: Engine<MemoryStore>,
    pub validators: ValidatorSet,
    events: Arc<RwLock<HashMap<EventId, Event>>>,
    heads: HashMap<ValidatorId, (Seq, EventId)>,
    clock: Timestamp,
    salt: u64,
}

pub fn validator(tag: u8) -> ValidatorId {
    PublicKey([tag; 32])
}

/// Fatal sink that panics, so a consistency error fails the test loudly.
pub fn panicking_sink() -> Arc<dyn Fn(&VectorError) + Send + Sync> {
    Arc::new(|err: &VectorError| panic!("fatal engine error: {err}"))
}

fn map_lookup(events: &Arc<RwLock<HashMap<EventId, Event>>>) -> EventLookup {
    let events = Arc::clone(events);
    Arc::new(move |id: &EventId| {
        events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    })
}

impl DagBuilder {
    /// Fresh engine over validators with the given weights; validator `i`
    /// gets identity `PublicKey([i; 32])`.
    pub fn new(weights: &[Weight]) -> Self {
        let validators = ValidatorSet::from_weights(
            weights
                .iter()
                .enumerate()
                .map(|(i, w)| (validator(i as u8), *w)),
        );

        let events: Arc<RwLock<HashMap<EventId, Event>>> = Arc::default();
        let mut engine = Engine::new(panicking_sink(), EngineConfig::lite());
        engine.reset(validators.clone(), MemoryStore::new(), map_lookup(&events));

        DagBuilder {
            engine,
            validators,
            events,
            heads: HashMap::new(),
            clock: 0,
            salt: 0,
        }
    }

    /// Re-run reset on the same engine with a fresh store, as an epoch
    /// transition would.
    pub fn reset(&mut self) {
        self.engine.reset(
            self.validators.clone(),
            MemoryStore::new(),
            map_lookup(&self.events),
        );
        self.heads.clear();
    }

    /// Mint and add the creator's next event: self-parent is the creator's
    /// current head, `cross` are additional parents from other validators.
    pub fn emit(&mut self, creator: u8, cross: &[EventId]) -> EventId {
        let event = self.mint_next(creator, cross);
        let id = event.id;
        self.engine.add(&event).expect("add failed");
        id
    }

    /// Mint and add an equivocating event: same creator and sequence number
    /// as `rival`, different content, self-parent taken from `rival`'s own
    /// self-parent. Does not move the creator's head.
    pub fn emit_fork_of(&mut self, rival: &EventId, cross: &[EventId]) -> EventId {
        let original = self.lookup_event(rival);
        let mut parents: Vec<EventId> = Vec::new();
        parents.extend(original.self_parent().copied());
        parents.extend_from_slice(cross);

        let creator = original.creator;
        let event = self.mint_raw(creator, original.seq, parents);
        let id = event.id;
        self.engine.add(&event).expect("add failed");
        id
    }

    /// Mint the creator's next event and register it in the lookup map
    /// without feeding it to the engine. The event becomes the creator's
    /// head either way.
    pub fn mint_next(&mut self, creator: u8, cross: &[EventId]) -> Event {
        let creator_id = validator(creator);
        let (seq, mut parents) = match self.heads.get(&creator_id) {
            Some((seq, head)) => (seq + 1, vec![*head]),
            None => (1, Vec::new()),
        };
        parents.extend_from_slice(cross);
        let event = self.mint_raw(creator_id, seq, parents);
        self.heads.insert(creator_id, (event.seq, event.id));
        event
    }

    fn mint_raw(&mut self, creator: ValidatorId, seq: Seq, parents: Vec<EventId>) -> Event {
        self.clock += 1;
        self.salt += 1;
        let payload = hash_blake3(&self.salt.to_le_bytes());
        let event =
            Event::new(creator, seq, self.clock, parents, payload).expect("event construction");
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(event.id, event.clone());
        event
    }

    pub fn add(&mut self, event: &Event) -> Result<(), VectorError> {
        self.engine.add(event)
    }

    pub fn lookup_event(&self, id: &EventId) -> Event {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
            .expect("event registered")
    }

    pub fn creation_time(&self, id: &EventId) -> Timestamp {
        self.lookup_event(id).creation_time
    }
}
