//! Chain-manager errors: most rejections are a [`CoreError`] (the shared
//! reject-reason taxonomy every crate uses); the rest are operational
//! conditions specific to owning the store and the in-memory index.

use std::fmt;

use shared_types::{CoreError, Hash};

#[derive(Debug)]
pub enum ChainError {
    Invalid(CoreError),
    Storage(qc_03_store::StorageError),
    State(qc_04_state::StateError),
    Io(std::io::Error),
    /// The submitted block's hash is already known to the index, whether
    /// applied or sitting on a side branch.
    AlreadyKnown(Hash),
    /// The submitted block's branch was previously marked permanently
    /// invalid by a failed reorg or a failed direct extension.
    BranchInvalid(Hash),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Invalid(e) => write!(f, "{e}"),
            ChainError::Storage(e) => write!(f, "{e}"),
            ChainError::State(e) => write!(f, "{e}"),
            ChainError::Io(e) => write!(f, "{e}"),
            ChainError::AlreadyKnown(h) => write!(f, "block {h:02x?} is already known"),
            ChainError::BranchInvalid(h) => write!(f, "branch rooted at {h:02x?} is permanently invalid"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<CoreError> for ChainError {
    fn from(err: CoreError) -> Self {
        Self::Invalid(err)
    }
}

impl From<qc_03_store::StorageError> for ChainError {
    fn from(err: qc_03_store::StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<qc_04_state::StateError> for ChainError {
    fn from(err: qc_04_state::StateError) -> Self {
        Self::State(err)
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
