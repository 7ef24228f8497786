//! Pending transaction pool: a `tx_hash -> Transaction` map with secondary
//! indices by signer address and by fee rate, the admission pipeline
//! (basic validate, state-validate against a copy-on-write overlay of the
//! tip, byte-budget eviction), and the hooks a chain manager calls on
//! block commit and on reorg to keep the pool consistent with the tip.

#![deny(unsafe_code)]

pub mod config;
pub mod domain;

pub use config::MempoolConfig;
pub use domain::{GossipItemType, GossipRecord, MempoolEntry, MempoolError, TransactionPool};
