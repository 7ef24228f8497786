//! Nonce-search task used by the miner's worker threads.

use crate::ComputeEngine;
use primitive_types::U256;
use std::sync::Arc;

pub struct MiningTask {
    /// Serialized header with everything but the mining nonce fixed.
    pub header_template: Vec<u8>,
    pub target: U256,
    pub nonce_start: u64,
    pub nonce_count: u64,
}

#[derive(Debug, Clone)]
pub struct MiningResult {
    pub nonce: u64,
    pub hash: [u8; 32],
}

impl MiningTask {
    pub fn execute(self, engine: &Arc<dyn ComputeEngine>) -> Option<MiningResult> {
        engine
            .pow_search(
                &self.header_template,
                self.target,
                self.nonce_start,
                self.nonce_count,
            )
            .map(|(nonce, hash)| MiningResult { nonce, hash })
    }
}
