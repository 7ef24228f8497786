//! Merkle root computation over transaction hashes.
//!
//! Odd-sized levels duplicate the last element rather than leaving it
//! unpaired, matching the tie-break the block header's merkle field commits
//! to.

use crate::ComputeEngine;
use std::sync::Arc;

pub struct MerkleRootTask {
    pub leaf_hashes: Vec<[u8; 32]>,
}

impl MerkleRootTask {
    pub fn execute(self, engine: &Arc<dyn ComputeEngine>) -> [u8; 32] {
        if self.leaf_hashes.is_empty() {
            return [0u8; 32];
        }
        if self.leaf_hashes.len() == 1 {
            return self.leaf_hashes[0];
        }

        let mut level = self.leaf_hashes;
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            let pairs: Vec<Vec<u8>> = level
                .chunks(2)
                .map(|pair| {
                    let mut combined = Vec::with_capacity(64);
                    combined.extend_from_slice(&pair[0]);
                    combined.extend_from_slice(&pair[1]);
                    combined
                })
                .collect();
            level = engine.batch_hash(&pairs);
        }
        level[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_engine;

    #[test]
    fn single_leaf_is_its_own_root() {
        let engine = cpu_engine();
        let leaf = [7u8; 32];
        let root = MerkleRootTask {
            leaf_hashes: vec![leaf],
        }
        .execute(&engine);
        assert_eq!(root, leaf);
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let engine = cpu_engine();
        let root = MerkleRootTask { leaf_hashes: vec![] }.execute(&engine);
        assert_eq!(root, [0u8; 32]);
    }

    #[test]
    fn odd_leaf_count_duplicates_last() {
        let engine = cpu_engine();
        let leaves = vec![[1u8; 32], [2u8; 32], [3u8; 32]];
        let with_explicit_dup = vec![[1u8; 32], [2u8; 32], [3u8; 32], [3u8; 32]];

        let root_odd = MerkleRootTask {
            leaf_hashes: leaves,
        }
        .execute(&engine);
        let root_padded = MerkleRootTask {
            leaf_hashes: with_explicit_dup,
        }
        .execute(&engine);
        assert_eq!(root_odd, root_padded);
    }
}
