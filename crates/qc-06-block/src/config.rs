//! Block-layer configuration: difficulty/subsidy parameters plus the
//! header-validation tolerances that aren't part of consensus-critical
//! difficulty math (timestamp skew).

use serde::{Deserialize, Serialize};

use crate::difficulty::DifficultyConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockConfig {
    pub difficulty: DifficultyConfig,
    /// How far into the future (relative to local wall-clock) a header's
    /// timestamp may claim to be before it's rejected outright.
    pub max_future_skew_secs: u64,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            difficulty: DifficultyConfig::default(),
            max_future_skew_secs: 15 * 60,
        }
    }
}
