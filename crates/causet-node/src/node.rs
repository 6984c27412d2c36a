use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use causet_core::{serialize, SignedEvent, ValidatorSet};
use causet_store::FileStore;
use causet_vector::{Engine, FatalSink, VectorError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::admission::{heavy_check, light_check, CheckedEvent, HeavyChecker, Orderer};
use crate::config::NodeConfig;
use crate::event_store::{store_lookup, EventStore};

const EPOCH_FILE: &str = "epoch";
const EVENTS_DB: &str = "events.db";

/// The Causet node: admission pipeline in front of the vector engine.
pub struct Node {
    config: NodeConfig,
    validators: ValidatorSet,
    engine: Engine<FileStore>,
    events: Arc<RwLock<EventStore<FileStore>>>,
    orderer: Orderer,
    checker: HeavyChecker,
    checked_rx: mpsc::Receiver<CheckedEvent>,
    ingest_tx: mpsc::Sender<SignedEvent>,
    ingest_rx: mpsc::Receiver<SignedEvent>,
    epoch: u64,
}

/// Cloneable submission handle for transport layers and tools.
#[derive(Clone)]
pub struct NodeHandle {
    tx: mpsc::Sender<SignedEvent>,
}

impl NodeHandle {
    pub async fn submit(&self, signed: SignedEvent) -> Result<()> {
        self.tx
            .send(signed)
            .await
            .map_err(|_| anyhow::anyhow!("node is shut down"))
    }
}

/// Unrecoverable engine errors halt the process; the vectors on disk can no
/// longer be trusted past this point.
fn fatal_sink() -> FatalSink {
    Arc::new(|err: &VectorError| {
        error!(error = %err, "fatal vector engine error, aborting");
        std::process::abort();
    })
}

pub fn vectors_db_path(data_dir: &Path, epoch: u64) -> PathBuf {
    data_dir.join(format!("vectors-epoch-{epoch}.db"))
}

pub fn events_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(EVENTS_DB)
}

fn read_epoch(data_dir: &Path) -> Result<u64> {
    let path = data_dir.join(EPOCH_FILE);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(&path)?;
    content
        .trim()
        .parse()
        .with_context(|| format!("malformed epoch file {path:?}"))
}

fn write_epoch(data_dir: &Path, epoch: u64) -> Result<()> {
    std::fs::write(data_dir.join(EPOCH_FILE), epoch.to_string())?;
    Ok(())
}

impl Node {
    /// Create a node from configuration, opening the current epoch and
    /// replaying stored events whose vectors were lost with the staging
    /// buffer.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let validators = config.to_validator_set()?;
        std::fs::create_dir_all(&config.data_dir)?;
        let epoch = read_epoch(&config.data_dir)?;

        let events = Arc::new(RwLock::new(EventStore::new(FileStore::open(
            events_db_path(&config.data_dir),
        )?)));

        let mut engine = Engine::new(fatal_sink(), config.engine_config());
        let vectors = FileStore::open(vectors_db_path(&config.data_dir, epoch))?;
        engine.reset(validators.clone(), vectors, store_lookup(Arc::clone(&events)));

        let (checked_tx, checked_rx) = mpsc::channel(256);
        let (ingest_tx, ingest_rx) = mpsc::channel(256);
        let checker = HeavyChecker::new(config.heavy_check_workers, checked_tx);

        let mut node = Node {
            config,
            validators,
            engine,
            events,
            orderer: Orderer::new(),
            checker,
            checked_rx,
            ingest_tx,
            ingest_rx,
            epoch,
        };
        node.replay_stored()?;
        Ok(node)
    }

    /// Re-admit stored events that have no vectors, in topological order.
    /// Events flushed to the event store can outlive unflushed vectors.
    fn replay_stored(&mut self) -> Result<()> {
        let stored = self.lock_events().all()?;
        if stored.is_empty() {
            return Ok(());
        }

        let mut replayed = 0usize;
        let mut replay = Orderer::new();
        for signed in stored {
            for ready in replay.offer(signed) {
                if !self.engine.contains(&ready.event.id)? {
                    self.engine.add(&ready.event)?;
                    replayed += 1;
                }
                self.orderer.mark_admitted(ready.event.id);
            }
        }
        if replayed > 0 {
            info!(events = replayed, "rebuilt vectors for stored events");
            self.engine.flush()?;
        }
        Ok(())
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            tx: self.ingest_tx.clone(),
        }
    }

    pub fn engine(&self) -> &Engine<FileStore> {
        &self.engine
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Main loop: light-check submissions, fan them out to heavy-check
    /// workers, deliver checked events in topological order, flush
    /// periodically and on shutdown.
    pub async fn run(mut self) -> Result<()> {
        info!(
            epoch = self.epoch,
            validators = self.validators.len(),
            "starting causet node"
        );

        let mut flush_timer = tokio::time::interval(Duration::from_secs(5));
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(signed) = self.ingest_rx.recv() => {
                    match light_check(&signed, &self.validators) {
                        Ok(()) => {
                            let _ = self.checker.submit(signed);
                        }
                        Err(err) => {
                            warn!(event = %signed.event.id, error = %err, "event rejected");
                        }
                    }
                }
                Some(checked) = self.checked_rx.recv() => {
                    match checked.result {
                        Ok(()) => self.deliver(checked.signed)?,
                        Err(err) => {
                            warn!(
                                event = %checked.signed.event.id,
                                error = %err,
                                "event failed heavy check"
                            );
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    self.flush()?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    self.flush()?;
                    return Ok(());
                }
            }
        }
    }

    /// Hand a fully checked event to the orderer and add whatever became
    /// deliverable to the engine.
    pub(crate) fn deliver(&mut self, signed: SignedEvent) -> Result<()> {
        for ready in self.orderer.offer(signed) {
            // store first: the engine's lookup must resolve the event
            self.lock_events().put(&ready)?;
            match self.engine.add(&ready.event) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(event = %ready.event.id, error = %err, "engine rejected event");
                }
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.engine.flush()?;
        self.lock_events().flush()?;
        Ok(())
    }

    /// Flush the current epoch, bump the epoch counter and rebind the
    /// engine to a fresh vector store. Prior-epoch vectors stay on disk but
    /// are never read again.
    pub fn force_epoch(&mut self) -> Result<u64> {
        self.flush()?;
        self.epoch += 1;
        write_epoch(&self.config.data_dir, self.epoch)?;

        let vectors = FileStore::open(vectors_db_path(&self.config.data_dir, self.epoch))?;
        self.engine.reset(
            self.validators.clone(),
            vectors,
            store_lookup(Arc::clone(&self.events)),
        );
        self.orderer = Orderer::new();
        info!(epoch = self.epoch, "advanced to new epoch");
        Ok(self.epoch)
    }

    /// Write all stored events to a JSON file.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let events = self.lock_events().all()?;
        let json = serialize::to_json_pretty(&events)?;
        std::fs::write(path, json)?;
        Ok(events.len())
    }

    /// Load events from a JSON export, check them and rebuild vectors.
    /// Events failing admission are skipped with a warning.
    pub fn import(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let events: Vec<SignedEvent> = serialize::from_json(&content)?;

        let mut imported = 0usize;
        for signed in events {
            if let Err(err) = light_check(&signed, &self.validators) {
                warn!(event = %signed.event.id, error = %err, "import skipped event");
                continue;
            }
            if let Err(err) = heavy_check(&signed) {
                warn!(event = %signed.event.id, error = %err, "import skipped event");
                continue;
            }
            self.deliver(signed)?;
            imported += 1;
        }
        self.flush()?;
        Ok(imported)
    }

    fn lock_events(&self) -> std::sync::RwLockWriteGuard<'_, EventStore<FileStore>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causet_core::{hash_blake3, Event, EventId, KeyPair};

    use crate::config::ValidatorEntry;

    struct TestSetup {
        keypairs: Vec<KeyPair>,
        config: NodeConfig,
        dir: PathBuf,
    }

    impl TestSetup {
        fn new(name: &str, validators: usize) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "causet-node-{}-{}",
                std::process::id(),
                name
            ));
            let _ = std::fs::remove_dir_all(&dir);

            let keypairs: Vec<KeyPair> = (0..validators).map(|_| KeyPair::generate()).collect();
            let config = NodeConfig {
                data_dir: dir.clone(),
                validators: keypairs
                    .iter()
                    .map(|kp| ValidatorEntry {
                        pubkey: kp.public.to_hex(),
                        weight: 1,
                    })
                    .collect(),
                ..NodeConfig::default()
            };
            TestSetup {
                keypairs,
                config,
                dir,
            }
        }

        fn signed(&self, validator: usize, seq: u32, parents: Vec<EventId>) -> SignedEvent {
            let kp = &self.keypairs[validator];
            let event = Event::new(
                kp.public,
                seq,
                seq as u64 * 100 + validator as u64,
                parents,
                hash_blake3(&[validator as u8, seq as u8]),
            )
            .unwrap();
            SignedEvent::sign(event, &kp.secret)
        }
    }

    impl Drop for TestSetup {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn test_deliver_feeds_engine() {
        let setup = TestSetup::new("deliver", 4);
        let mut node = Node::new(setup.config.clone()).unwrap();

        let a1 = setup.signed(0, 1, vec![]);
        let b1 = setup.signed(1, 1, vec![a1.event.id]);
        let c1 = setup.signed(2, 1, vec![a1.event.id]);
        let b2 = setup.signed(1, 2, vec![b1.event.id, c1.event.id]);

        for signed in [&a1, &b1, &c1, &b2] {
            node.deliver(signed.clone()).unwrap();
        }

        assert!(node.engine().contains(&b2.event.id).unwrap());
        assert!(node
            .engine()
            .forkless_cause(&b2.event.id, &a1.event.id)
            .unwrap());
    }

    #[test]
    fn test_deliver_buffers_out_of_order() {
        let setup = TestSetup::new("reorder", 2);
        let mut node = Node::new(setup.config.clone()).unwrap();

        let a1 = setup.signed(0, 1, vec![]);
        let a2 = setup.signed(0, 2, vec![a1.event.id]);

        node.deliver(a2.clone()).unwrap();
        assert!(!node.engine().contains(&a2.event.id).unwrap());

        node.deliver(a1.clone()).unwrap();
        assert!(node.engine().contains(&a1.event.id).unwrap());
        assert!(node.engine().contains(&a2.event.id).unwrap());
    }

    #[test]
    fn test_restart_replays_stored_events() {
        let setup = TestSetup::new("restart", 2);
        let a1 = setup.signed(0, 1, vec![]);
        let a2 = setup.signed(0, 2, vec![a1.event.id]);

        {
            let mut node = Node::new(setup.config.clone()).unwrap();
            node.deliver(a1.clone()).unwrap();
            node.deliver(a2.clone()).unwrap();
            // events flushed, vectors deliberately not
            node.lock_events().flush().unwrap();
        }

        let node = Node::new(setup.config.clone()).unwrap();
        assert!(node.engine().contains(&a1.event.id).unwrap());
        assert!(node
            .engine()
            .forkless_cause(&a2.event.id, &a2.event.id)
            .unwrap());
    }

    #[test]
    fn test_force_epoch_isolates_vectors() {
        let setup = TestSetup::new("epoch", 2);
        let mut node = Node::new(setup.config.clone()).unwrap();

        let a1 = setup.signed(0, 1, vec![]);
        node.deliver(a1.clone()).unwrap();
        assert!(node.engine().contains(&a1.event.id).unwrap());

        let epoch = node.force_epoch().unwrap();
        assert_eq!(epoch, 1);
        assert!(!node.engine().contains(&a1.event.id).unwrap());
        assert_eq!(read_epoch(&setup.config.data_dir).unwrap(), 1);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let setup = TestSetup::new("export", 2);
        let export_path = setup.dir.join("dag.json");

        let a1 = setup.signed(0, 1, vec![]);
        let b1 = setup.signed(1, 1, vec![a1.event.id]);

        {
            let mut node = Node::new(setup.config.clone()).unwrap();
            node.deliver(a1.clone()).unwrap();
            node.deliver(b1.clone()).unwrap();
            node.flush().unwrap();
            assert_eq!(node.export(&export_path).unwrap(), 2);
        }

        let fresh = TestSetup::new("import", 2);
        let mut node = Node::new(NodeConfig {
            validators: setup.config.validators.clone(),
            ..fresh.config.clone()
        })
        .unwrap();
        assert_eq!(node.import(&export_path).unwrap(), 2);
        assert!(node
            .engine()
            .forkless_cause(&b1.event.id, &a1.event.id)
            .unwrap());
    }
}
