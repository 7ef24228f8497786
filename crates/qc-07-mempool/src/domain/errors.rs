//! Mempool-specific rejection reasons. Everything a transaction itself can
//! be rejected *for* is already a `shared_types::CoreError` variant
//! (produced by `qc-05-tx`'s validation); this enum only adds the handful
//! of reasons that belong to the pool, not the transaction.

use shared_types::CoreError;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MempoolError {
    /// The transaction itself failed basic or state validation.
    Invalid(CoreError),
    /// Already present in the pool under the same hash.
    AlreadyPresent,
    /// Below `min_fee_per_byte` and the pool has no room to make an
    /// exception for it regardless.
    FeeTooLow { fee_per_byte: u64, minimum: u64 },
    /// The pool is at its byte budget and no lower fee-rate entry could be
    /// evicted to make room.
    PoolFull { max_bytes: u64 },
}

impl fmt::Display for MempoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "transaction rejected: {err:?}"),
            Self::AlreadyPresent => write!(f, "transaction already in pool"),
            Self::FeeTooLow {
                fee_per_byte,
                minimum,
            } => write!(f, "fee rate {fee_per_byte} below minimum {minimum}"),
            Self::PoolFull { max_bytes } => write!(f, "pool full at {max_bytes} bytes"),
        }
    }
}

impl std::error::Error for MempoolError {}

impl From<CoreError> for MempoolError {
    fn from(err: CoreError) -> Self {
        Self::Invalid(err)
    }
}
