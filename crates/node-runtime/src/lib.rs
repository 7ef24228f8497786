//! # Node Runtime
//!
//! The executable that turns the subsystem crates (`qc-01` through
//! `qc-11`) into a running node: loads configuration, selects the
//! network's genesis, opens the on-disk chain, and drives the
//! miner/P2P/sync tasks for the process's lifetime.
//!
//! Everything consensus-critical lives below this crate; this crate only
//! wires, configures, and exits with the right code (see
//! [`node::BootstrapError`] and `main`'s exit-code mapping).

#![deny(unsafe_code)]

pub mod config;
pub mod genesis;
pub mod network_params;
pub mod node;
pub mod stats;

pub use config::{ConfigError, NodeConfig};
pub use network_params::{NetworkParams, NetworkType};
pub use node::{BootstrapError, Node};
pub use stats::NodeStats;
