use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod cli;

use causet_node::config::{generate_sample_config, NodeConfig};
use causet_node::node::{events_db_path, vectors_db_path, Node};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .pretty()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(config).await?;
        }
        Commands::Init { output, validators } => {
            init_config(output, validators)?;
        }
        Commands::Keygen { output } => {
            generate_keypair(output)?;
        }
        Commands::Compact { config } => {
            compact_stores(config)?;
        }
        Commands::Export { config, out } => {
            export_events(config, out)?;
        }
        Commands::Import { config, file } => {
            import_events(config, file)?;
        }
        Commands::ForceEpoch { config } => {
            force_epoch(config)?;
        }
    }

    Ok(())
}

fn load_config(config_path: &PathBuf) -> Result<NodeConfig> {
    if config_path.exists() {
        NodeConfig::load(config_path)
    } else {
        error!(
            "Configuration file not found: {:?}. Run 'causet init' to create one.",
            config_path
        );
        Err(anyhow::anyhow!("Configuration file not found"))
    }
}

/// Run a Causet node
async fn run_node(config_path: PathBuf) -> Result<()> {
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)?;

    let node = Node::new(config)?;
    node.run().await?;

    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: PathBuf, validators: usize) -> Result<()> {
    info!("Generating sample configuration");

    let config = generate_sample_config(validators);
    config.save(&output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Edit the file to customize your node settings.");
    println!("\nTo start the node, run:");
    println!("  causet run --config {}", output.display());

    Ok(())
}

/// Generate a new keypair
fn generate_keypair(output: Option<PathBuf>) -> Result<()> {
    let keypair = causet_core::KeyPair::generate();

    println!("Generated new keypair:");
    println!("  Public key:  {}", keypair.public.to_hex());
    println!("  Secret key:  {}", keypair.secret.to_hex());

    if let Some(path) = output {
        std::fs::write(&path, keypair.secret.to_hex())?;
        info!("Secret key saved to {:?}", path);
    }

    println!("\nWARNING: Keep your secret key safe! Do not share it with anyone.");

    Ok(())
}

/// Rewrite the event and vector snapshots in place. Runs on the store
/// files directly, so the node must not be running.
fn compact_stores(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;

    let events_path = events_db_path(&config.data_dir);
    if events_path.exists() {
        let mut store = causet_store::FileStore::open(&events_path)?;
        store.compact()?;
        info!("Compacted {:?}", events_path);
    }

    for epoch in 0.. {
        let path = vectors_db_path(&config.data_dir, epoch);
        if !path.exists() {
            break;
        }
        let mut store = causet_store::FileStore::open(&path)?;
        store.compact()?;
        info!("Compacted {:?}", path);
    }

    Ok(())
}

/// Export admitted events as JSON
fn export_events(config_path: PathBuf, out: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let node = Node::new(config)?;
    let count = node.export(&out)?;
    println!("Exported {} events to {}", count, out.display());
    Ok(())
}

/// Import events from a JSON export
fn import_events(config_path: PathBuf, file: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let mut node = Node::new(config)?;
    let count = node.import(&file)?;
    println!("Imported {} events from {}", count, file.display());
    Ok(())
}

/// Flush and advance to the next epoch
fn force_epoch(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let mut node = Node::new(config)?;
    let epoch = node.force_epoch()?;
    println!("Advanced to epoch {epoch}");
    Ok(())
}
