//! Chain-manager configuration: the reorg depth limit plus the block-layer
//! config it delegates header/PoW/difficulty checks to.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub block: qc_06_block::BlockConfig,
    /// A reorg deeper than this many blocks on either side is refused
    /// outright rather than replayed, so a peer with a long secret branch
    /// can't force an unbounded revert.
    pub reorg_limit: u64,
    /// Trailing header count used for the median-time-past check: a new
    /// block's timestamp must exceed the median of this many immediate
    /// ancestors.
    pub median_time_window: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            block: qc_06_block::BlockConfig::default(),
            reorg_limit: 10_000,
            median_time_window: 11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ChainConfig::default();
        assert!(cfg.reorg_limit > 0);
        assert!(cfg.median_time_window > 0);
    }
}
