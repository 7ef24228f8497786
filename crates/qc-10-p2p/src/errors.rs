//! Session and service errors. Most are reasons a session ends; a few
//! (`ChainRejected`, `MempoolRejected`) wrap the reject reason from the
//! crates a session hands gossip off to.

use std::fmt;

use shared_types::Hash;

#[derive(Debug)]
pub enum PeerError {
    /// The frame's declared length exceeds the configured maximum.
    FrameTooLarge(u32),
    /// The connection closed, or timed out, before a full frame arrived.
    Io(std::io::Error),
    /// A frame did not decode into any known envelope.
    Malformed(qc_02_codec::CodecError),
    /// The peer's `VE` didn't match ours before anything else was sent.
    HandshakeNotFirst,
    /// The peer's genesis hash doesn't match ours; it is on a different
    /// network and is banned on the spot.
    GenesisMismatch { ours: Hash, theirs: Hash },
    /// No data arrived within the session's idle deadline.
    Timeout,
    /// The peer exceeded its own declared rate and ignored throttling.
    RateExceeded,
    /// The peer sent something structurally valid but contextually wrong
    /// (e.g. a second `VE`, a `BK` for a hash nobody requested).
    ProtocolViolation(&'static str),
    /// The peer is on the ban list.
    Banned,
    ChainRejected(qc_08_chain::ChainError),
    MempoolRejected(qc_07_mempool::MempoolError),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerError::FrameTooLarge(n) => write!(f, "frame of {n} bytes exceeds the configured maximum"),
            PeerError::Io(e) => write!(f, "{e}"),
            PeerError::Malformed(e) => write!(f, "{e}"),
            PeerError::HandshakeNotFirst => write!(f, "peer sent a message before completing the handshake"),
            PeerError::GenesisMismatch { ours, theirs } => {
                write!(f, "genesis mismatch: ours {ours:02x?}, theirs {theirs:02x?}")
            }
            PeerError::Timeout => write!(f, "peer session timed out"),
            PeerError::RateExceeded => write!(f, "peer exceeded its declared rate"),
            PeerError::ProtocolViolation(why) => write!(f, "protocol violation: {why}"),
            PeerError::Banned => write!(f, "peer is banned"),
            PeerError::ChainRejected(e) => write!(f, "{e}"),
            PeerError::MempoolRejected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PeerError {}

impl From<std::io::Error> for PeerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<qc_02_codec::CodecError> for PeerError {
    fn from(err: qc_02_codec::CodecError) -> Self {
        Self::Malformed(err)
    }
}

impl From<qc_08_chain::ChainError> for PeerError {
    fn from(err: qc_08_chain::ChainError) -> Self {
        Self::ChainRejected(err)
    }
}

impl From<qc_07_mempool::MempoolError> for PeerError {
    fn from(err: qc_07_mempool::MempoolError) -> Self {
        Self::MempoolRejected(err)
    }
}

/// Whether a session-ending error earns the peer a ban, and for how
/// long relative to the configured base duration.
impl PeerError {
    pub fn bans_peer(&self) -> bool {
        matches!(
            self,
            PeerError::GenesisMismatch { .. } | PeerError::ProtocolViolation(_) | PeerError::RateExceeded | PeerError::Banned
        )
    }

    /// Genesis mismatch means "wrong network" — there is no future where
    /// retrying helps, so it is the one ban that never expires.
    pub fn permanent_ban(&self) -> bool {
        matches!(self, PeerError::GenesisMismatch { .. })
    }
}
