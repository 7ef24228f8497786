//! P2P tunables. Mirrors `qc-09-miner::MinerConfig` in shape: a plain
//! struct with a hand-written `Default`, loaded by `node-runtime` and
//! passed down by value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2pConfig {
    /// Local listen address, e.g. `0.0.0.0:10900`. `None` disables inbound
    /// connections — the node only ever dials out.
    pub listen_addr: Option<String>,
    /// Peer count the bootstrap loop tries to maintain.
    pub target_peer_count: usize,
    /// Hard ceiling on simultaneously connected peers.
    pub max_peers: usize,
    /// Bytes per second this node declares (and enforces) for inbound
    /// traffic from each peer, via `P2P_ACK`.
    pub peer_rate_limit: u64,
    /// How long a temporary ban lasts, in seconds.
    pub ban_duration_secs: u64,
    /// A session with no inbound frame for this long is disconnected.
    pub idle_timeout_secs: u64,
    /// How often the bootstrap loop checks the peer count and dials more.
    pub bootstrap_interval_secs: u64,
    /// Largest frame this node will accept, in bytes. Bounds both the
    /// allocation for an incoming frame and the largest block/transaction
    /// a peer can push.
    pub max_frame_bytes: u32,
    /// Wire protocol version this node speaks.
    pub protocol_version: u32,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: Some("0.0.0.0:10900".to_string()),
            target_peer_count: 8,
            max_peers: 64,
            peer_rate_limit: 4 * 1024 * 1024,
            ban_duration_secs: 24 * 60 * 60,
            idle_timeout_secs: 90,
            bootstrap_interval_secs: 30,
            max_frame_bytes: 8 * 1024 * 1024,
            protocol_version: 1,
        }
    }
}
