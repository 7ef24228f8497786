//! # Canonical Reject-Reason Taxonomy
//!
//! One enum for every named error code the design calls out, so a
//! transaction or block rejection can be logged, gossiped back to a
//! submitter, and used by the P2P layer to decide whether to ban the peer
//! that sent it, without each crate inventing its own incompatible codes.

use thiserror::Error;

/// A rejection reason for a transaction, a block, or a peer interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // -- decoding --
    #[error("malformed: {0}")]
    Malformed(String),

    // -- transaction-level --
    #[error("invalid signature")]
    InvalidSignature,
    #[error("signing key already used by this address")]
    ReusedSigningKey,
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("insufficient balance of token {token:?}: have {have}, need {need}")]
    InsufficientTokenBalance { token: crate::Hash, have: u64, need: u64 },
    #[error("nonce gap: expected {expected}, got {got}")]
    NonceGap { expected: u64, got: u64 },
    #[error("duplicate transaction")]
    DuplicateTx,
    #[error("unknown token {0:?}")]
    UnknownToken(crate::Hash),
    #[error("token {0:?} already exists")]
    TokenAlreadyExists(crate::Hash),
    #[error("multi-sig threshold not met: {have} of {need}")]
    ThresholdNotMet { have: u64, need: u64 },
    #[error("expired at height {0}")]
    Expired(u64),

    // -- block-level --
    #[error("proof of work does not meet target")]
    BadPoW,
    #[error("merkle root mismatch")]
    BadMerkleRoot,
    #[error("timestamp out of range")]
    BadTimestamp,
    #[error("block height {got} is not parent height {parent} + 1")]
    BadHeight { got: u64, parent: u64 },
    #[error("parent header not found: {0:?}")]
    UnknownParent(crate::Hash),

    // -- chain-level --
    #[error("reorg depth {depth} exceeds limit {limit}")]
    ReorgTooDeep { depth: u64, limit: u64 },
    #[error("store corruption: {0}")]
    StoreCorruption(String),

    // -- peer-level --
    #[error("peer timed out")]
    PeerTimeout,
    #[error("peer exceeded its declared rate limit")]
    PeerRateExceeded,
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl CoreError {
    /// True for errors that are always safe to discard: the offending
    /// artifact must never be retried as-is.
    pub fn is_malformed(&self) -> bool {
        matches!(self, CoreError::Malformed(_))
    }

    /// True for errors severe enough that the sending peer should be
    /// banned rather than merely having the artifact dropped.
    pub fn is_bannable(&self) -> bool {
        matches!(
            self,
            CoreError::Malformed(_)
                | CoreError::BadPoW
                | CoreError::BadMerkleRoot
                | CoreError::ProtocolViolation(_)
                | CoreError::PeerRateExceeded
        )
    }

    /// True for fatal errors that should halt the node rather than merely
    /// rejecting the triggering input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::StoreCorruption(_))
    }
}

/// Node operational states, surfaced on the admin/introspection snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Running,
    Syncing,
    HaltedAwaitingIntervention,
}

pub type CoreResult<T> = Result<T, CoreError>;
