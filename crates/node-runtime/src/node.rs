//! Wires every subsystem crate into one running process: opens the
//! on-disk chain at the configured genesis, starts the miner pool (if
//! configured to mine), starts the P2P service, and drives periodic
//! catch-up sync against whichever connected peer is furthest ahead.
//!
//! There's exactly one production storage backend in this workspace
//! (`qc_03_store` depends on `rocksdb` unconditionally), so this struct
//! is concrete over [`RocksKVStore`] rather than generic — the `KV`
//! parameter every subsystem crate carries exists for their own test
//! suites, not for a second backend this crate would have to support.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use qc_03_store::adapters::kv::RocksKVStore;
use qc_03_store::StorageError;
use qc_07_mempool::TransactionPool;
use qc_08_chain::{ChainError, ChainManager};
use qc_09_miner::Miner;
use qc_10_p2p::P2pService;
use qc_11_sync::Syncer;
use tracing::{error, info, warn};

use crate::config::NodeConfig;
use crate::genesis;
use crate::network_params::NetworkParams;
use crate::stats::{self, NodeStats};

pub struct Node {
    chain: Arc<Mutex<ChainManager<RocksKVStore>>>,
    mempool: Arc<Mutex<TransactionPool>>,
    miner: Arc<Miner<RocksKVStore>>,
    p2p: Arc<P2pService<RocksKVStore>>,
    syncer: Arc<Syncer<RocksKVStore>>,
    config: NodeConfig,
    /// Kept alive for the process lifetime; dropping it would unregister
    /// every metric from `quantum_telemetry::REGISTRY`.
    _metrics: quantum_telemetry::MetricsHandle,
}

/// A node can only fail to start for reasons that are either a
/// configuration mistake (exit code 1) or on-disk corruption a human has
/// to look at (exit code 2) — anything else is a bug, not a startup
/// outcome this type distinguishes.
#[derive(Debug)]
pub enum BootstrapError {
    Config(String),
    StoreCorruption(ChainError),
    Other(anyhow::Error),
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootstrapError::Config(msg) => write!(f, "configuration error: {msg}"),
            BootstrapError::StoreCorruption(err) => write!(f, "storage corruption, manual recovery required: {err}"),
            BootstrapError::Other(err) => write!(f, "{err}"),
        }
    }
}

fn is_store_corruption(err: &ChainError) -> bool {
    matches!(err, ChainError::Storage(StorageError::DataCorruption { .. }))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// A bare-bones HTTP/1.1 responder for `GET /metrics` — the workspace has
/// no HTTP framework dependency anywhere outside the RPC gateway this
/// crate doesn't build against, so this doesn't pull one in just to say
/// "200 OK" once per scrape. Every other request also gets the metrics
/// body; a real reverse proxy in front of this is expected to route.
async fn serve_metrics(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics endpoint listening");
    loop {
        let (mut stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let _ = stream.read(&mut buf).await;
            let body = quantum_telemetry::encode_metrics().unwrap_or_default();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body,
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
    }
}

impl Node {
    pub fn bootstrap(config: NodeConfig) -> Result<Self, BootstrapError> {
        std::fs::create_dir_all(&config.storage.data_dir).map_err(|e| BootstrapError::Other(e.into()))?;

        let params = NetworkParams::for_network(config.network.network_type);
        let genesis_block = genesis::build_for_network(&params);

        let chain = ChainManager::<RocksKVStore>::open(&config.storage.data_dir, config.consensus.chain.clone(), config.storage.store_config(), genesis_block)
            .map_err(|err| if is_store_corruption(&err) { BootstrapError::StoreCorruption(err) } else { BootstrapError::Other(err.into()) })?;
        let genesis_hash = chain.header_at(0).ok_or_else(|| BootstrapError::Config("chain opened with no genesis header".to_string()))?.hash();
        let chain = Arc::new(Mutex::new(chain));

        let mempool = Arc::new(Mutex::new(TransactionPool::new(config.mempool.clone())));

        let coinbase_recipient = config.mining.mining_address.unwrap_or_else(|| params.genesis_allocations().first().map(|a| a.recipient).unwrap_or(shared_types::Address([0u8; 25])));
        let miner = Arc::new(Miner::new(Arc::clone(&chain), Arc::clone(&mempool), qc_compute::cpu_engine(), config.mining.miner.clone(), coinbase_recipient));

        let p2p = Arc::new(P2pService::new(Arc::clone(&chain), Arc::clone(&mempool), qc_05_tx::TxConfig::default(), config.network.p2p.clone(), genesis_hash));

        let syncer = Arc::new(Syncer::new(Arc::clone(&chain), Arc::clone(&mempool), Arc::clone(p2p.peers()), config.network.sync.clone(), genesis_hash));

        let metrics = quantum_telemetry::register_metrics().map_err(|e| BootstrapError::Other(e.into()))?;

        Ok(Self { chain, mempool, miner, p2p, syncer, config, _metrics: metrics })
    }

    pub fn stats(&self) -> NodeStats {
        stats::snapshot(&self.chain, &self.mempool, self.p2p.peers())
    }

    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        self.miner.refresh_template(unix_now());
        self.miner.start();

        let bootstrap_addrs: Vec<_> = self.config.network.bootstrap_peers.iter().filter_map(|s| s.parse().ok()).collect();
        let p2p = Arc::clone(&self.p2p);
        let p2p_task = tokio::spawn(async move {
            if let Err(err) = p2p.run(bootstrap_addrs).await {
                error!(%err, "p2p service exited");
            }
        });

        let sync_task = tokio::spawn(Arc::clone(&self).sync_loop());

        if let Some(addr) = &self.config.logging.metrics_addr {
            let addr = addr.parse().map_err(|e| anyhow::anyhow!("invalid metrics_addr {addr:?}: {e}"))?;
            tokio::spawn(async move {
                if let Err(err) = serve_metrics(addr).await {
                    error!(%err, "metrics endpoint exited");
                }
            });
        }

        tokio::select! {
            _ = p2p_task => {}
            _ = sync_task => {}
        }

        self.miner.stop();
        Ok(())
    }

    /// Polls for a peer ahead of the local tip every
    /// `sync_poll_interval_secs` and, whenever a window of blocks lands,
    /// rebuilds the mining template against the new tip — neither
    /// `P2pService` nor `Syncer` has a callback into the miner, so this
    /// loop is the node's only place that connects "tip moved" to
    /// "mining template is stale".
    async fn sync_loop(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.network.sync_poll_interval_secs.max(1));
        loop {
            match self.syncer.sync_to_tip().await {
                Ok(0) => {}
                Ok(n) => {
                    info!(fetched = n, "caught up on new blocks");
                    self.miner.refresh_template(unix_now());
                }
                Err(err) => warn!(%err, "sync attempt failed"),
            }
            tokio::time::sleep(interval).await;
        }
    }
}
