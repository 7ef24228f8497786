//! Configuration for basic (stateless) transaction validation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxConfig {
    /// Maximum length of a `Message` transaction's opaque payload.
    pub max_message_bytes: usize,
    /// Maximum number of `(recipient, amount)` pairs in a single `Transfer`
    /// or `TokenTransfer`.
    pub max_outputs_per_tx: usize,
    /// Maximum number of delegated keys a single `Slave` transaction may
    /// register in one call.
    pub max_delegated_keys_per_tx: usize,
    /// Maximum number of signatories a `MultiSigCreate` may declare.
    pub max_signatories: usize,
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 1024,
            max_outputs_per_tx: 256,
            max_delegated_keys_per_tx: 16,
            max_signatories: 32,
        }
    }
}
