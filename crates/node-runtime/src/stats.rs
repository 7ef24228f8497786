//! A read-only snapshot of node state. This is the entire admin surface
//! this crate exposes — no RPC dispatch, no control endpoints, just a
//! value a caller (a log line today, a future status endpoint) can read.

use std::sync::{Arc, Mutex};

use qc_03_store::adapters::kv::KeyValueStore;
use qc_07_mempool::TransactionPool;
use qc_08_chain::ChainManager;
use shared_types::Hash;

#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeStats {
    pub tip_height: u64,
    pub tip_hash: Hash,
    pub cumulative_difficulty: u128,
    pub mempool_size: usize,
    pub mempool_bytes: u64,
    pub peer_count: usize,
}

pub fn snapshot<KV: KeyValueStore + 'static>(
    chain: &Arc<Mutex<ChainManager<KV>>>,
    mempool: &Arc<Mutex<TransactionPool>>,
    peers: &qc_10_p2p::peer::PeerTable,
) -> NodeStats {
    let chain = chain.lock().expect("chain mutex poisoned");
    let mempool = mempool.lock().expect("mempool mutex poisoned");
    let tip = chain.tip();
    NodeStats {
        tip_height: tip.height,
        tip_hash: tip.hash(),
        cumulative_difficulty: chain.cumulative_difficulty(),
        mempool_size: mempool.len(),
        mempool_bytes: mempool.total_bytes(),
        peer_count: peers.connected_count(),
    }
}
