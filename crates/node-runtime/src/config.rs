//! Node configuration: a plain value built once at startup from a TOML
//! file overlaid with environment variables, then threaded by reference
//! into every subsystem constructor. There is no global/lazy-static
//! config cell anywhere in this crate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared_types::Address;

use crate::network_params::NetworkType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub max_file_bytes: u64,
    pub max_block_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let defaults = qc_03_store::StoreConfig::default();
        Self { data_dir: PathBuf::from("./data"), max_file_bytes: defaults.max_file_bytes, max_block_bytes: defaults.max_block_bytes }
    }
}

impl StorageConfig {
    pub fn store_config(&self) -> qc_03_store::StoreConfig {
        qc_03_store::StoreConfig { max_file_bytes: self.max_file_bytes, max_block_bytes: self.max_block_bytes }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub network_type: NetworkType,
    pub p2p: qc_10_p2p::P2pConfig,
    pub sync: qc_11_sync::SyncConfig,
    /// Peers dialed on first boot, in addition to the network's built-in
    /// bootstrap list (see [`crate::network_params::NetworkParams`]).
    pub bootstrap_peers: Vec<String>,
    /// How often [`crate::node::Node::run`] checks whether a peer is
    /// ahead of the local tip and, if so, runs a sync window.
    pub sync_poll_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Dev,
            p2p: qc_10_p2p::P2pConfig::default(),
            sync: qc_11_sync::SyncConfig::default(),
            bootstrap_peers: Vec::new(),
            sync_poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub chain: qc_08_chain::ChainConfig,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { chain: qc_08_chain::ChainConfig::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub miner: qc_09_miner::MinerConfig,
    /// Coinbase recipient for blocks this node mines. `None` forces
    /// `miner.worker_threads` to `0` regardless of its configured value —
    /// there's no address to pay the subsidy to.
    pub mining_address: Option<Address>,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self { miner: qc_09_miner::MinerConfig::default(), mining_address: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json: bool,
    /// Address the Prometheus text-exposition endpoint binds to. `None`
    /// disables it entirely — mirrors `qc_10_p2p::P2pConfig::listen_addr`.
    pub metrics_addr: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json: false, metrics_addr: None }
    }
}

impl LoggingConfig {
    /// Mirrors [`quantum_telemetry::config::TelemetryConfig::from_env`]'s
    /// manual overlay: `QC_LOG_LEVEL`/`RUST_LOG` and `QC_JSON_LOGS` win
    /// over whatever the config file said.
    fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("QC_LOG_LEVEL").or_else(|_| std::env::var("RUST_LOG")) {
            self.log_level = level;
        }
        if let Ok(flag) = std::env::var("QC_JSON_LOGS") {
            self.json = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
    }

    pub fn telemetry_config(&self, network: &str) -> quantum_telemetry::TelemetryConfig {
        quantum_telemetry::TelemetryConfig {
            log_level: self.log_level.clone(),
            log_format: if self.json { quantum_telemetry::LogFormat::Json } else { quantum_telemetry::LogFormat::Pretty },
            network: network.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub consensus: ConsensusConfig,
    pub mempool: qc_07_mempool::MempoolConfig,
    pub mining: MiningConfig,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            network: NetworkConfig::default(),
            consensus: ConsensusConfig::default(),
            mempool: qc_07_mempool::MempoolConfig::default(),
            mining: MiningConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        self.logging.apply_env();
        if let Ok(dir) = std::env::var("QC_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("QC_MINING_ADDRESS") {
            if let Ok(parsed) = Address::from_base58(&addr) {
                self.mining.mining_address = Some(parsed);
            }
        }
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.mining.mining_address.is_none() && self.mining.miner.worker_threads > 0 {
            self.mining.miner.worker_threads = 0;
        }
        Ok(())
    }
}
