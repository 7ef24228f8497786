//! Miner tunables: thread count, batch size, and how often a worker checks
//! for template invalidation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Worker threads, each owning a disjoint nonce subrange. `0` runs the
    /// miner loop without ever submitting a template — used by a node that
    /// only validates and relays.
    pub worker_threads: u32,
    /// Nonces searched per call into the compute engine before a worker
    /// checks the template's sequence counter. Smaller batches make
    /// template invalidation more responsive at the cost of per-batch
    /// call overhead.
    pub batch_size: u64,
    /// Soft cap on the byte size of the transaction selection pulled from
    /// the mempool into a template.
    pub max_block_bytes: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            batch_size: 1_000_000,
            max_block_bytes: 2 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = MinerConfig::default();
        assert!(cfg.batch_size > 0);
        assert!(cfg.max_block_bytes > 0);
    }
}
