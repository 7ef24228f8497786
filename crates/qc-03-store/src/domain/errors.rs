use shared_types::Hash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("block not found: {0:02x?}")]
    BlockNotFound(Hash),

    #[error("no block at height {0}")]
    HeightNotFound(u64),

    #[error("block already exists: {0:02x?}")]
    BlockExists(Hash),

    #[error("checksum mismatch for block {hash:02x?}: expected {expected:08x}, got {actual:08x}")]
    DataCorruption {
        hash: Hash,
        expected: u32,
        actual: u32,
    },

    #[error("block of {size} bytes exceeds the {max} byte limit")]
    BlockTooLarge { size: usize, max: usize },

    #[error("genesis block is immutable")]
    GenesisImmutable,

    #[error("record does not decode: {0}")]
    Codec(#[from] qc_02_codec::CodecError),

    #[error("rocksdb error: {0}")]
    Database(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("database directory locked by another process: {0}")]
    Locked(String),
}
