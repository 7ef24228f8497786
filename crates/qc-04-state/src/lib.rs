//! # Account State (qc-04)
//!
//! A flat `Address -> AccountState` overlay plus a `token_hash -> TokenMeta`
//! registry, not a Merkle-Patricia trie: this node has no light-client proof
//! surface, so the extra indirection of a trie buys nothing here. What a
//! trie-backed design would get from intermediate nodes, this crate gets
//! from a per-block undo-log instead — enough to revert a losing fork's
//! state changes one block at a time during a reorg, without ever needing
//! to prove an account's inclusion to anyone outside this process.
//!
//! `apply_transaction` as named in the spec is not a method on this crate:
//! `qc-05-tx` validates and applies individual transactions by calling the
//! primitive mutators on [`StateTxn`] directly, one call per block via
//! [`StateStore::apply_block`]. This crate only owns the account map and
//! the undo bookkeeping.

pub mod errors;
pub mod store;

pub use errors::StateError;
pub use store::{StateStore, StateTxn};
