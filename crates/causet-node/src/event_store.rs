use std::sync::{Arc, RwLock};

use anyhow::Result;
use causet_core::{serialize, Event, EventId, SignedEvent};
use causet_store::{table, Store};
use causet_vector::EventLookup;
use tracing::error;

const EVENTS: u8 = b'E';

/// Durable store for admitted signed events, shared between the ingest
/// path (writes) and the engine's event lookup (reads).
pub struct EventStore<S: Store> {
    db: S,
}

impl<S: Store> EventStore<S> {
    pub fn new(db: S) -> Self {
        EventStore { db }
    }

    pub fn put(&mut self, signed: &SignedEvent) -> Result<()> {
        let bytes = serialize::to_bytes(signed)?;
        self.db
            .put(&table::key(EVENTS, signed.event.id.as_bytes()), &bytes)?;
        Ok(())
    }

    pub fn get(&self, id: &EventId) -> Result<Option<SignedEvent>> {
        let Some(bytes) = self.db.get(&table::key(EVENTS, id.as_bytes()))? else {
            return Ok(None);
        };
        Ok(Some(serialize::from_bytes(&bytes)?))
    }

    pub fn contains(&self, id: &EventId) -> Result<bool> {
        Ok(self.db.exists(&table::key(EVENTS, id.as_bytes()))?)
    }

    /// Every stored event, in key order.
    pub fn all(&self) -> Result<Vec<SignedEvent>> {
        let mut events = Vec::new();
        for key in self.db.keys_with_prefix(&table::prefix(EVENTS))? {
            if let Some(bytes) = self.db.get(&key)? {
                events.push(serialize::from_bytes(&bytes)?);
            }
        }
        Ok(events)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn db_mut(&mut self) -> &mut S {
        &mut self.db
    }
}

/// Event lookup backed by a shared event store; a store failure is logged
/// and surfaces as a missing event, which the engine treats as fatal.
pub fn store_lookup<S: Store + Sync + 'static>(store: Arc<RwLock<EventStore<S>>>) -> EventLookup {
    Arc::new(move |id: &EventId| -> Option<Event> {
        let guard = store.read().unwrap_or_else(|e| e.into_inner());
        match guard.get(id) {
            Ok(found) => found.map(|signed| signed.event),
            Err(err) => {
                error!(event = %id, error = %err, "event lookup failed");
                None
            }
        }
    })
}
