//! Sync errors. Most end one peer's sync attempt and trigger
//! re-selection of the source peer, per spec; genesis mismatch and a
//! dishonest header chain additionally ban.

use std::fmt;

use shared_types::Hash;

#[derive(Debug)]
pub enum SyncError {
    Io(std::io::Error),
    Malformed(qc_02_codec::CodecError),
    /// No connected peer is ahead of our own cumulative difficulty.
    NoPeer,
    /// The peer's genesis hash doesn't match ours.
    GenesisMismatch { ours: Hash, theirs: Hash },
    /// A request for headers or a block got no reply within the
    /// configured window timeout.
    Timeout,
    /// The peer replied with something other than what was asked for,
    /// or a header run that doesn't chain: broken parent linkage, a
    /// height gap, or a header that fails its own declared PoW target.
    InconsistentChain(String),
    /// The block body's hash doesn't match the header it was fetched
    /// for — the peer served a different block than it advertised.
    BlockMismatch { expected: Hash, got: Hash },
    ChainRejected(qc_08_chain::ChainError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Io(e) => write!(f, "{e}"),
            SyncError::Malformed(e) => write!(f, "{e}"),
            SyncError::NoPeer => write!(f, "no connected peer has a higher cumulative difficulty"),
            SyncError::GenesisMismatch { ours, theirs } => {
                write!(f, "genesis mismatch: ours {ours:02x?}, theirs {theirs:02x?}")
            }
            SyncError::Timeout => write!(f, "sync request timed out"),
            SyncError::InconsistentChain(why) => write!(f, "inconsistent header chain: {why}"),
            SyncError::BlockMismatch { expected, got } => {
                write!(f, "block hash mismatch: expected {expected:02x?}, got {got:02x?}")
            }
            SyncError::ChainRejected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<qc_02_codec::CodecError> for SyncError {
    fn from(err: qc_02_codec::CodecError) -> Self {
        Self::Malformed(err)
    }
}

impl From<qc_08_chain::ChainError> for SyncError {
    fn from(err: qc_08_chain::ChainError) -> Self {
        Self::ChainRejected(err)
    }
}

impl SyncError {
    pub fn bans_peer(&self) -> bool {
        matches!(self, SyncError::GenesisMismatch { .. } | SyncError::InconsistentChain(_) | SyncError::BlockMismatch { .. })
    }

    pub fn permanent_ban(&self) -> bool {
        matches!(self, SyncError::GenesisMismatch { .. })
    }
}
