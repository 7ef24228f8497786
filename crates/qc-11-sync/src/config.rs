use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How many headers (and, afterward, block bodies) to request per
    /// round trip. The sliding window: a small window keeps a single
    /// timeout's wasted work small; a large one amortizes round-trip
    /// latency better against a fast, honest peer.
    pub window_size: u32,
    /// Per-request timeout, in seconds. Exceeding it fails the window
    /// and re-selects the source peer rather than retrying the same one.
    pub request_timeout_secs: u64,
    pub max_frame_bytes: u32,
    pub protocol_version: u32,
    /// Ban duration applied on a dishonest header chain.
    pub ban_duration_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_size: 128,
            request_timeout_secs: 20,
            max_frame_bytes: 8 * 1024 * 1024,
            protocol_version: 1,
            ban_duration_secs: 24 * 60 * 60,
        }
    }
}
