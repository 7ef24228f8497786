//! Block header/body, the subsidy and halving schedule, compact-to-256-bit
//! difficulty target mapping, proportional-controller retargeting, genesis
//! construction, and header/body validation.
//!
//! Per-transaction validation belongs to `qc-05-tx`; this crate only checks
//! what a header commits to (height/parent linkage, timestamp, proof of
//! work, merkle root) plus the body-level leading-coinbase rule.

#![deny(unsafe_code)]

pub mod config;
pub mod difficulty;
pub mod entities;
pub mod genesis;
pub mod validate;

pub use config::BlockConfig;
pub use difficulty::{bits_from_target, is_retarget_height, retarget, subsidy, DifficultyConfig};
pub use entities::{Block, BlockHeader};
pub use genesis::{build_genesis, GenesisAllocation};
pub use validate::{merkle_root, validate_block, validate_header, HeaderContext};
