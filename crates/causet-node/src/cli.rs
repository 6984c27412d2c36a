use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Causet - DAG causality engine node
#[derive(Parser)]
#[command(name = "causet")]
#[command(about = "Causet node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Causet node
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Number of sample validators to generate
        #[arg(long, default_value = "4")]
        validators: usize,
    },

    /// Generate a new keypair
    Keygen {
        /// Output file for secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite store snapshots to drop dead entries
    Compact {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Export admitted events as JSON
    Export {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Import events from a JSON export and rebuild vectors
    Import {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Input file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Flush and advance to the next epoch
    ForceEpoch {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}
