//! Content hashing.
//!
//! The same SHA3-256 sponge is used for transaction/block content hashes and
//! for the PoW search in `qc-compute`, per the spec's single-primitive
//! hashing contract.

use sha3::{Digest, Sha3_256};

pub type Hash = [u8; 32];

/// Hash `data` with SHA3-256 (one-shot).
pub fn hash(data: &[u8]) -> Hash {
    let digest = Sha3_256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Hash the concatenation of several byte slices without an intermediate
/// allocation, for hashing an envelope and payload together.
pub fn hash_many(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash(b"test"), hash(b"test"));
    }

    #[test]
    fn different_inputs_differ() {
        assert_ne!(hash(b"input1"), hash(b"input2"));
    }

    #[test]
    fn hash_many_matches_concatenation() {
        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(b"hello ");
        concatenated.extend_from_slice(b"world");
        assert_eq!(hash_many(&[b"hello ", b"world"]), hash(&concatenated));
    }
}
