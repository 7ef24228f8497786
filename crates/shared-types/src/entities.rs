//! # Core Domain Entities
//!
//! The on-chain data model: addresses, accounts, tokens, and the metadata
//! the chain manager keeps about each header.
//!
//! ## Clusters
//!
//! - **Identity**: `Hash`, `Address`, `PublicKeyBytes`, `SignatureBytes`
//! - **State**: `AccountState`, `DelegatedKey`, `TokenMeta`
//! - **Chain bookkeeping**: `BlockMetaData`, `ForkState`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A 256-bit content hash (SHA3-256 of the canonical encoding of something).
pub type Hash = [u8; 32];

/// The zero hash, used as the parent of genesis.
pub const ZERO_HASH: Hash = [0u8; 32];

/// A post-quantum public key, variable length (~897 bytes for Falcon-512).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub Vec<u8>);

/// A post-quantum signature, variable length (up to ~690 bytes for Falcon-512).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(pub Vec<u8>);

/// Network-visible account identifier.
///
/// Binary form is `version_byte || truncated_hash(public_key)[..20] ||
/// checksum[..4]` (25 bytes total); the base-58 string form is canonical in
/// user interfaces, the binary form is canonical inside blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 25]);

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("address base-58 decoding failed: {0}")]
    Decode(String),
    #[error("address has wrong length: expected 25 bytes, got {0}")]
    WrongLength(usize),
    #[error("address checksum mismatch")]
    BadChecksum,
}

impl Address {
    pub const VERSION_MAINNET: u8 = 0x01;
    pub const VERSION_TESTNET: u8 = 0x02;
    pub const VERSION_DEV: u8 = 0x03;

    pub fn version(&self) -> u8 {
        self.0[0]
    }

    pub fn to_base58(self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::Decode(e.to_string()))?;
        if bytes.len() != 25 {
            return Err(AddressError::WrongLength(bytes.len()));
        }
        let mut out = [0u8; 25];
        out.copy_from_slice(&bytes);
        let addr = Address(out);
        if !addr.checksum_valid() {
            return Err(AddressError::BadChecksum);
        }
        Ok(addr)
    }

    pub fn checksum_valid(&self) -> bool {
        let computed = checksum_of(&self.0[..21]);
        self.0[21..25] == computed
    }
}

/// Four-byte checksum: first 4 bytes of SHA3-256(SHA3-256(payload)).
fn checksum_of(payload: &[u8]) -> [u8; 4] {
    use sha3::{Digest, Sha3_256};
    let once = Sha3_256::digest(payload);
    let twice = Sha3_256::digest(once);
    let mut out = [0u8; 4];
    out.copy_from_slice(&twice[..4]);
    out
}

/// Builds an `Address` from a version byte and a 20-byte truncated public
/// key hash, computing and appending the checksum.
pub fn build_address(version: u8, truncated_hash: &[u8; 20]) -> Address {
    let mut payload = [0u8; 21];
    payload[0] = version;
    payload[1..21].copy_from_slice(truncated_hash);
    let checksum = checksum_of(&payload);
    let mut out = [0u8; 25];
    out[..21].copy_from_slice(&payload);
    out[21..25].copy_from_slice(&checksum);
    Address(out)
}

/// The access level granted to a delegated (slave) signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessType {
    /// May sign any transaction type on behalf of the master address.
    All,
    /// May only sign Transfer and Message transactions.
    TransferOnly,
}

/// A public key delegated by a master address via a `Slave` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedKey {
    pub public_key: PublicKeyBytes,
    pub access: AccessType,
}

/// Per-address state persisted in the chain state store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: u64,
    pub nonce: u64,
    pub token_balances: BTreeMap<Hash, u64>,
    /// Signing keys this address has already used at least once. A key
    /// appearing here can never sign for this address again.
    pub used_keys: Vec<PublicKeyBytes>,
    pub delegated_keys: Vec<DelegatedKey>,
}

impl AccountState {
    pub fn has_used_key(&self, key: &PublicKeyBytes) -> bool {
        self.used_keys.iter().any(|k| k == key)
    }

    pub fn slave_access_for(&self, key: &PublicKeyBytes) -> Option<AccessType> {
        self.delegated_keys
            .iter()
            .find(|d| &d.public_key == key)
            .map(|d| d.access)
    }
}

/// Metadata for a token created by a `TokenCreate` transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMeta {
    pub creating_tx_hash: Hash,
    pub symbol: String,
    pub name: String,
    pub owner: Address,
    pub decimals: u8,
    pub total_supply: u64,
}

/// Bookkeeping the chain manager keeps for every header it has accepted,
/// independent of whether that header is on the main chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockMetaData {
    pub cumulative_difficulty: u128,
    pub child_header_hashes: Vec<Hash>,
    /// The `N` most recent ancestor header hashes (for median-timestamp and
    /// difficulty-retarget windows), most recent first.
    pub last_n_header_hashes: Vec<Hash>,
}

/// A checkpointed in-progress reorg, persisted so the process can resume a
/// crashed reorg from where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkState {
    pub initiator: Hash,
    pub fork_point: Hash,
    /// Ancestor -> current tip, in application order (oldest first).
    pub old_path: Vec<Hash>,
    /// Ancestor -> candidate tip, in application order (oldest first).
    pub new_path: Vec<Hash>,
    /// How many entries of `old_path` have been reverted so far.
    pub reverted: usize,
    /// How many entries of `new_path` have been applied so far.
    pub applied: usize,
}
