//! # Chain Manager (qc-08)
//!
//! The single writer of chain state: validates incoming headers and
//! bodies, tracks every branch it has seen in an in-memory index, and
//! keeps the account/multisig state committed to whichever branch carries
//! the highest cumulative proof-of-work, reorganizing via a
//! lowest-common-ancestor walk when a side branch overtakes the tip.
//!
//! Storage (`qc-03-store`), per-transaction validation (`qc-05-tx`), and
//! header/body structural checks (`qc-06-block`) are delegated to their
//! owning crates; this crate only owns the fork-choice and replay logic
//! that sits above them.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod fork_state;
pub mod index;
pub mod manager;
pub mod meta;

pub use config::ChainConfig;
pub use errors::ChainError;
pub use fork_state::{ForkState, ForkStateFile};
pub use index::{BlockIndex, InsertOutcome};
pub use manager::{AcceptOutcome, BlockTemplate, ChainManager};
pub use meta::{ChainMeta, ChainMetaFile};
