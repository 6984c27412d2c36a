use std::path::PathBuf;

use anyhow::Result;
use causet_core::{KeyPair, PublicKey, ValidatorSet};
use causet_vector::EngineConfig;
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node data directory
    pub data_dir: PathBuf,

    /// Epoch validator set
    pub validators: Vec<ValidatorEntry>,

    /// Validator private key (hex) - only for validator nodes
    pub validator_key: Option<String>,

    /// Concurrent heavy-check workers
    pub heavy_check_workers: usize,

    /// Highest-Before cache size in bytes
    pub highest_cache_bytes: usize,

    /// Lowest-After cache size in bytes
    pub lowest_cache_bytes: usize,

    /// Staged-write buffer limit in bytes
    pub staging_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub pubkey: String,
    pub weight: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        NodeConfig {
            data_dir: PathBuf::from("./causet-data"),
            validators: Vec::new(),
            validator_key: None,
            heavy_check_workers: 4,
            highest_cache_bytes: engine.highest_cache_bytes,
            lowest_cache_bytes: engine.lowest_cache_bytes,
            staging_limit_bytes: engine.staging_limit_bytes,
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Parse the configured validator entries into an epoch validator set.
    pub fn to_validator_set(&self) -> Result<ValidatorSet> {
        let members: Result<Vec<(PublicKey, u64)>> = self
            .validators
            .iter()
            .map(|entry| {
                PublicKey::from_hex(&entry.pubkey)
                    .map(|pk| (pk, entry.weight))
                    .map_err(|e| anyhow::anyhow!(e))
            })
            .collect();

        let set = ValidatorSet::from_weights(members?);
        if set.is_empty() {
            anyhow::bail!("validator set is empty");
        }
        Ok(set)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            highest_cache_bytes: self.highest_cache_bytes,
            lowest_cache_bytes: self.lowest_cache_bytes,
            staging_limit_bytes: self.staging_limit_bytes,
        }
    }
}

/// Generate a sample configuration with freshly generated validator keys;
/// the first validator's secret key is kept as this node's identity.
pub fn generate_sample_config(validators: usize) -> NodeConfig {
    let keypairs: Vec<KeyPair> = (0..validators.max(1)).map(|_| KeyPair::generate()).collect();

    NodeConfig {
        validators: keypairs
            .iter()
            .map(|kp| ValidatorEntry {
                pubkey: kp.public.to_hex(),
                weight: 1,
            })
            .collect(),
        validator_key: Some(keypairs[0].secret.to_hex()),
        ..NodeConfig::default()
    }
}
