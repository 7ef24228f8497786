//! Miner errors. A worker finding a nonce and then losing the race to
//! submit it (the tip already moved) is not an error worth surfacing loudly
//! — it just refetches — so this enum only covers conditions worth logging
//! at `warn` or above.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("mined block rejected by chain manager: {0}")]
    Rejected(#[from] qc_08_chain::ChainError),
}
