//! Entry point: loads configuration, opens the chain, and runs the node
//! until `SIGINT`/`SIGTERM` or a fatal error. No CLI flags beyond an
//! optional config file path — flag parsing, RPC, and a wallet front
//! end are all out of scope for this binary.

use std::path::PathBuf;
use std::process::ExitCode;

use node_runtime::config::NodeConfig;
use node_runtime::node::{BootstrapError, Node};
use tracing::{error, info};

fn config_path() -> PathBuf {
    std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("qc-node.toml"))
}

fn load_config(path: &std::path::Path) -> Result<NodeConfig, ExitCode> {
    if !path.exists() {
        return Ok(NodeConfig::default());
    }
    NodeConfig::from_file(path).map_err(|err| {
        eprintln!("configuration error: {err}");
        ExitCode::from(1)
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let path = config_path();
    let config = match load_config(&path) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let telemetry = config.logging.telemetry_config(&config.network.network_type.to_string());
    if let Err(err) = quantum_telemetry::init_tracing(&telemetry) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(1);
    }

    info!(network = %config.network.network_type, data_dir = %config.storage.data_dir.display(), "starting node");

    let node = match Node::bootstrap(config) {
        Ok(node) => node,
        Err(BootstrapError::Config(msg)) => {
            error!(%msg, "configuration error");
            return ExitCode::from(1);
        }
        Err(BootstrapError::StoreCorruption(err)) => {
            error!(%err, "storage corruption detected, manual recovery required");
            return ExitCode::from(2);
        }
        Err(BootstrapError::Other(err)) => {
            error!(%err, "failed to start node");
            return ExitCode::from(1);
        }
    };

    let node = std::sync::Arc::new(node);
    let run_node = std::sync::Arc::clone(&node);

    tokio::select! {
        result = run_node.run() => {
            if let Err(err) = result {
                error!(%err, "node exited with an error");
                return ExitCode::from(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    ExitCode::SUCCESS
}
