//! # PoW Miner (qc-09)
//!
//! Drains the mempool into a candidate block, searches for a nonce whose
//! header hash beats the chain's current target, and submits the result
//! back through the chain manager. Runs zero or more worker threads, each
//! owning a disjoint slice of the nonce space; a shared sequence counter
//! invalidates in-flight work the moment a new tip (ours or a peer's)
//! makes the template stale.
//!
//! The nonce search itself is delegated to `qc-compute`'s CPU backend —
//! this crate only owns template construction, subrange assignment, and
//! the single path back into `qc-08-chain::ChainManager::submit_block`.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod pool;
pub mod template;
pub mod worker;

pub use config::MinerConfig;
pub use errors::MinerError;
pub use pool::{nonce_subranges, Miner};
pub use template::{ActiveTemplate, TemplateSlot};
