//! # P2P Layer (qc-10)
//!
//! Stream-oriented peer sessions over TCP. Every message is a 4-byte
//! big-endian length prefix followed by one [`message::Message`]
//! envelope (see [`frame`]). A session opens with a version handshake
//! keyed on the genesis hash — mismatched networks disconnect and ban
//! on the spot, never partially talk to each other.
//!
//! Gossip is two-phase: `HaveHash` announces a hash, and the receiver
//! pulls the body with `SendFullMessage` only if it doesn't already
//! have it — transactions are deduplicated against
//! `qc_07_mempool::TransactionPool`, blocks against this crate's own
//! [`gossip::SeenBlocks`] cache. Flow control is a per-peer sliding
//! one-second byte counter ([`flow_control`]); repeated violations in
//! the same window escalate from a throttle to a temporary ban.
//!
//! This crate owns sessions, the peer table, and ban enforcement. It
//! does not own catch-up sync (see `qc-11-sync`) or peer discovery
//! beyond a static seed list — both build on top of what's exported
//! here ([`peer::PeerTable::best_peer`] for picking a sync source,
//! [`message::Message::Sync`]/`HeaderHashes` for the wire exchange).

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod flow_control;
pub mod frame;
pub mod gossip;
pub mod message;
pub mod peer;
pub mod service;
pub mod session;

pub use config::P2pConfig;
pub use errors::PeerError;
pub use message::{ItemKind, Message, PeerAddr};
pub use peer::{PeerState, PeerTable};
pub use service::P2pService;
pub use session::{Direction, SharedState};
