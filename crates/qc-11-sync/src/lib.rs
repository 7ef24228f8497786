//! # Header-First Sync (qc-11)
//!
//! Catch-up sync for a full node that has fallen behind. Picks the
//! peer with the highest advertised cumulative difficulty, walks its
//! header chain from our tip, validates the header run before
//! spending a round trip on any block body, then pulls bodies by
//! height in sliding windows (see [`config::SyncConfig::window_size`]).
//!
//! Unlike [`qc_10_p2p`]'s gossip sessions, a sync attempt opens its
//! own outbound connection and drives a strictly sequential
//! request/response exchange over it — there's no multiplexing
//! needed, and routing through a shared gossip session would mean
//! teaching that loop to correlate replies it wasn't built to expect.
//!
//! A peer that serves a header run that doesn't chain, or a block
//! body that doesn't hash to the header it was fetched for, is
//! banned via the same [`qc_10_p2p::PeerTable`] the gossip layer uses.

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod header_chain;
pub mod syncer;

pub use config::SyncConfig;
pub use errors::SyncError;
pub use header_chain::validate_header_run;
pub use syncer::Syncer;
