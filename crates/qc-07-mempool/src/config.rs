//! Mempool admission parameters.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MempoolConfig {
    /// Total byte budget across all admitted transactions. Once exceeded,
    /// the lowest fee-rate entries are evicted until the pool fits again.
    pub mempool_max_bytes: u64,
    /// Transactions below this fee rate (fee per encoded byte) are
    /// rejected outright rather than admitted and immediately evicted.
    pub min_fee_per_byte: u64,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            mempool_max_bytes: 32 * 1024 * 1024,
            min_fee_per_byte: 1,
        }
    }
}
