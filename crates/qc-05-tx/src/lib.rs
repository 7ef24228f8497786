//! # Transactions (qc-05)
//!
//! The transaction taxonomy: one signed envelope, nine payload variants
//! (`Transfer`, `Coinbase`, `Message`, `TokenCreate`, `TokenTransfer`,
//! `Slave`, `MultiSigCreate`, `MultiSigSpend`, `MultiSigVote`). Validation
//! is split into two passes mirroring the mempool admission and
//! block-application boundary:
//!
//! - [`validate::basic_validate`] — pure, stateless structural checks
//!   (sizes, counts, overflow) run before a transaction ever touches state.
//! - [`validate::state_validate_and_apply`] — signer authorization,
//!   signature verification, the once-only signing-key rule, the nonce
//!   sequence, and the payload's effect on [`qc_04_state::StateTxn`] and
//!   [`multisig::MultiSigRegistry`].
//!
//! Multi-sig accounts live in their own registry here, not inside
//! `qc-04-state::AccountState` — see `multisig`'s module doc for why.

pub mod config;
pub mod entities;
pub mod multisig;
pub mod validate;

pub use config::TxConfig;
pub use entities::{Transaction, TxPayload};
pub use multisig::{MultiSigAccount, MultiSigRegistry, MultiSigTxn, PendingSpend};
pub use validate::{basic_validate, state_validate_and_apply, TxContext};
