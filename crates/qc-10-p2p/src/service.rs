//! Wires peer sessions to the chain and mempool: accepts inbound
//! connections, dials out to reach the configured peer count, and spawns
//! one task per session under the shared state both the miner and (once
//! built) the syncer also hold a handle to.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qc_03_store::adapters::kv::KeyValueStore;
use qc_05_tx::TxConfig;
use qc_07_mempool::TransactionPool;
use qc_08_chain::ChainManager;
use shared_types::Hash;
use tokio::net::{TcpListener, TcpStream};

use crate::config::P2pConfig;
use crate::gossip::SeenBlocks;
use crate::peer::PeerTable;
use crate::session::{run_session, Direction, SharedState};

pub struct P2pService<KV: KeyValueStore + 'static> {
    state: SharedState<KV>,
}

impl<KV: KeyValueStore + 'static> P2pService<KV> {
    pub fn new(
        chain: Arc<Mutex<ChainManager<KV>>>,
        mempool: Arc<Mutex<TransactionPool>>,
        tx_config: TxConfig,
        config: P2pConfig,
        genesis_hash: Hash,
    ) -> Self {
        let seen_cache_capacity = 4096;
        Self {
            state: SharedState {
                chain,
                mempool,
                peers: Arc::new(PeerTable::new()),
                seen_blocks: Arc::new(Mutex::new(SeenBlocks::new(seen_cache_capacity))),
                tx_config: Arc::new(tx_config),
                config: Arc::new(config),
                genesis_hash,
            },
        }
    }

    pub fn peers(&self) -> &Arc<PeerTable> {
        &self.state.peers
    }

    /// Broadcasts a `Tx` or block `HaveHash` announcement would require a
    /// live handle to every connected session's write half, which this
    /// type doesn't keep (sessions own their own socket); a node wanting
    /// push-on-mine behavior re-announces on the next `Sync`/`HaveHash`
    /// exchange a peer initiates. Kept as a documented limitation rather
    /// than a half-built fanout channel — see `qc-11-sync` for the piece
    /// that actively pulls instead of waiting to be asked.
    pub async fn run(&self, listener_addrs: Vec<SocketAddr>) -> std::io::Result<()> {
        let listener = match &self.state.config.listen_addr {
            Some(addr) => Some(TcpListener::bind(addr).await?),
            None => None,
        };

        let bootstrap_state = self.state.clone();
        let bootstrap_interval = Duration::from_secs(self.state.config.bootstrap_interval_secs);
        tokio::spawn(bootstrap_loop(bootstrap_state, listener_addrs, bootstrap_interval));

        let idle_state = self.state.clone();
        let idle_timeout = self.state.config.idle_timeout_secs;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(idle_timeout.max(1))).await;
                let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs();
                for addr in idle_state.peers.idle_peers(now, idle_timeout) {
                    idle_state.peers.on_disconnected(&addr);
                }
            }
        });

        let Some(listener) = listener else {
            return std::future::pending::<std::io::Result<()>>().await;
        };

        loop {
            let (stream, addr) = listener.accept().await?;
            if self.state.peers.connected_count() >= self.state.config.max_peers {
                continue;
            }
            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(err) = run_session(stream, addr, Direction::Inbound, state).await {
                    quantum_telemetry::log_peer_event!(warn, "inbound session ended", addr, err = %err);
                }
            });
        }
    }
}

async fn dial<KV: KeyValueStore + 'static>(addr: SocketAddr, state: SharedState<KV>) {
    if state.peers.is_permanently_banned(&addr) {
        return;
    }
    match TcpStream::connect(addr).await {
        Ok(stream) => {
            if let Err(err) = run_session(stream, addr, Direction::Outbound, state).await {
                quantum_telemetry::log_peer_event!(warn, "outbound session ended", addr, err = %err);
            }
        }
        Err(err) => quantum_telemetry::log_peer_event!(warn, "failed to dial peer", addr, err = %err),
    }
}

/// Every `bootstrap_interval`, dials enough of `seed_addrs` to bring the
/// connected count up to `target_peer_count`. A real deployment would
/// draw candidates from `Peers` responses too; seeds are this crate's
/// only address source until a discovery mechanism exists above it.
async fn bootstrap_loop<KV: KeyValueStore + 'static>(state: SharedState<KV>, seed_addrs: Vec<SocketAddr>, interval: Duration) {
    loop {
        let deficit = state.config.target_peer_count.saturating_sub(state.peers.connected_count());
        if deficit > 0 {
            for &addr in seed_addrs.iter().take(deficit) {
                quantum_telemetry::log_peer_event!(info, "bootstrapping: dialing seed peer", addr);
                tokio::spawn(dial(addr, state.clone()));
            }
        }
        tokio::time::sleep(interval).await;
    }
}
