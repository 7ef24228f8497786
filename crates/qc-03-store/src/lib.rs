//! # Block Store (qc-03)
//!
//! Authoritative on-disk persistence for the node: append-only rotating
//! block files plus a rocksdb index mapping header hash and height to a
//! file location. Storage invariants only — parent linkage, fork choice
//! and finality live in `qc-08-chain`; this crate only knows how to put
//! bytes on disk and get them back, and to recover cleanly from a crash
//! mid-write.
//!
//! ## Invariants
//!
//! - **Atomic index updates**: a block's location and height index entry
//!   are written to rocksdb in one batch; either both are visible or
//!   neither is.
//! - **Checksum on read**: every record is CRC32C-checksummed at write
//!   time and verified at read time; mismatch is `DataCorruption`, never
//!   silently accepted.
//! - **Crash-safe recovery**: on open, a torn trailing frame in the active
//!   block file (partial write from a killed process) is truncated away
//!   rather than surfacing as a fatal error.
//! - **Single-instance enforcement**: an exclusive file lock on the data
//!   directory prevents two processes from mutating it concurrently.

pub mod adapters;
pub mod domain;
pub mod recovery;
pub mod service;

pub use adapters::block_file::BlockFile;
pub use adapters::kv::{InMemoryKVStore, RocksKVStore};
pub use adapters::lock::DatabaseLock;
pub use domain::entities::{BlockLocation, StorageMetadata};
pub use domain::errors::StorageError;
pub use service::{BlockStore, StoreConfig};
