//! In-memory header index: every structurally-valid header this node has
//! seen, linked by parent hash, with cumulative work tracked per header so
//! the canonical tip can be chosen as the header-reachable branch with the
//! highest total work (ties broken by earliest arrival).
//!
//! This index is rebuilt on restart from [`crate::meta::ChainMeta`]; it is
//! never itself the durable record.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use primitive_types::U256;
use qc_06_block::BlockHeader;
use shared_types::{CoreError, Hash};

#[derive(Clone, Debug)]
struct IndexedHeader {
    header: BlockHeader,
    cumulative_work: u128,
    arrival_seq: u64,
}

/// The work a header represents: the inverse of its target, so smaller
/// targets (harder proofs) contribute more work. Saturates at `u128::MAX`
/// rather than overflow for pathologically small targets.
fn block_work(bits: u32) -> u128 {
    let target = qc_06_block::difficulty::target_from_bits(bits);
    if target.is_zero() {
        return u128::MAX;
    }
    let work = U256::MAX / target;
    if work > U256::from(u128::MAX) {
        u128::MAX
    } else {
        work.as_u128()
    }
}

pub struct InsertOutcome {
    pub cumulative_work: u128,
    pub becomes_best: bool,
}

/// Caps how many permanently-invalid header hashes this node remembers.
/// Without a bound, a peer that keeps offering junk forks on top of a
/// rejected branch could grow `invalid` without limit; once the set is
/// full the oldest marking is evicted to make room for the newest.
const MAX_INVALID_HASHES: usize = 10_000;

pub struct BlockIndex {
    headers: HashMap<Hash, IndexedHeader>,
    invalid: HashSet<Hash>,
    /// Arrival order of `invalid`'s members, so the oldest can be evicted
    /// once the set reaches `MAX_INVALID_HASHES`.
    invalid_order: VecDeque<Hash>,
    best: Hash,
    next_seq: u64,
}

impl BlockIndex {
    pub fn new(genesis: &BlockHeader) -> Self {
        let hash = genesis.hash();
        let mut headers = HashMap::new();
        headers.insert(
            hash,
            IndexedHeader {
                header: genesis.clone(),
                cumulative_work: block_work(genesis.bits),
                arrival_seq: 0,
            },
        );
        Self { headers, invalid: HashSet::new(), invalid_order: VecDeque::new(), best: hash, next_seq: 1 }
    }

    /// Rebuilds the index from a header list in original arrival order
    /// (genesis first), preserving arrival-order tie-breaking.
    pub fn rebuild(headers_in_order: &[BlockHeader], invalid: &[Hash]) -> Self {
        let mut index = Self::new(&headers_in_order[0]);
        for header in &headers_in_order[1..] {
            index.insert(header.clone()).expect("persisted index must be internally consistent");
        }
        for hash in invalid {
            index.mark_invalid(*hash);
        }
        index.recompute_best();
        index
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.headers.contains_key(hash)
    }

    pub fn is_invalid(&self, hash: &Hash) -> bool {
        self.invalid.contains(hash)
    }

    pub fn header(&self, hash: &Hash) -> Option<&BlockHeader> {
        self.headers.get(hash).map(|ih| &ih.header)
    }

    pub fn cumulative_work(&self, hash: &Hash) -> Option<u128> {
        self.headers.get(hash).map(|ih| ih.cumulative_work)
    }

    pub fn best_hash(&self) -> Hash {
        self.best
    }

    /// All headers in arrival order, for persistence.
    pub fn headers_in_arrival_order(&self) -> Vec<BlockHeader> {
        let mut entries: Vec<&IndexedHeader> = self.headers.values().collect();
        entries.sort_by_key(|ih| ih.arrival_seq);
        entries.into_iter().map(|ih| ih.header.clone()).collect()
    }

    pub fn invalid_hashes(&self) -> Vec<Hash> {
        self.invalid_order.iter().copied().collect()
    }

    /// Registers a header whose parent is already indexed.
    pub fn insert(&mut self, header: BlockHeader) -> Result<InsertOutcome, CoreError> {
        let hash = header.hash();
        let parent_work = if header.height == 0 {
            0
        } else {
            self.headers
                .get(&header.parent_hash)
                .ok_or(CoreError::UnknownParent(header.parent_hash))?
                .cumulative_work
        };
        let cumulative_work = parent_work + block_work(header.bits);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.headers.insert(hash, IndexedHeader { header, cumulative_work, arrival_seq: seq });

        let becomes_best = !self.invalid.contains(&hash) && self.is_better(hash, self.best);
        if becomes_best {
            self.best = hash;
        }
        Ok(InsertOutcome { cumulative_work, becomes_best })
    }

    fn is_better(&self, candidate: Hash, current: Hash) -> bool {
        let c = &self.headers[&candidate];
        let cur = &self.headers[&current];
        (c.cumulative_work, Reverse(c.arrival_seq)) > (cur.cumulative_work, Reverse(cur.arrival_seq))
    }

    /// Marks a branch head permanently invalid and, if it was the current
    /// best, recomputes the best among the remaining valid headers. Evicts
    /// the oldest invalid marking once `MAX_INVALID_HASHES` is exceeded.
    pub fn mark_invalid(&mut self, hash: Hash) {
        if self.invalid.insert(hash) {
            self.invalid_order.push_back(hash);
            if self.invalid_order.len() > MAX_INVALID_HASHES {
                if let Some(oldest) = self.invalid_order.pop_front() {
                    self.invalid.remove(&oldest);
                }
            }
        }
        if self.best == hash {
            self.recompute_best();
        }
    }

    fn recompute_best(&mut self) {
        if let Some((hash, _)) = self
            .headers
            .iter()
            .filter(|(h, _)| !self.invalid.contains(*h))
            .min_by_key(|(_, ih)| (Reverse(ih.cumulative_work), ih.arrival_seq))
        {
            self.best = *hash;
        }
    }

    /// Walks parent pointers from `a` and `b` back to their lowest common
    /// ancestor. Returns `(ancestor, old_path, new_path)` where both paths
    /// are ancestor-exclusive and ordered oldest-first (ancestor -> tip).
    pub fn lowest_common_ancestor(&self, mut a: Hash, mut b: Hash) -> Option<(Hash, Vec<Hash>, Vec<Hash>)> {
        let mut old_path = Vec::new();
        let mut new_path = Vec::new();

        let mut height_a = self.headers.get(&a)?.header.height;
        let mut height_b = self.headers.get(&b)?.header.height;

        while height_a > height_b {
            old_path.push(a);
            a = self.headers[&a].header.parent_hash;
            height_a -= 1;
        }
        while height_b > height_a {
            new_path.push(b);
            b = self.headers[&b].header.parent_hash;
            height_b -= 1;
        }
        while a != b {
            old_path.push(a);
            new_path.push(b);
            if height_a == 0 {
                // Both chains exhausted their ancestry without meeting;
                // they don't share a root this index knows about.
                return None;
            }
            a = self.headers[&a].header.parent_hash;
            b = self.headers[&b].header.parent_hash;
            height_a -= 1;
        }
        old_path.reverse();
        new_path.reverse();
        Some((a, old_path, new_path))
    }

    /// Walks `n` headers back from `hash` (inclusive of `hash` itself at
    /// `n == 0`), stopping early at genesis.
    pub fn header_n_back(&self, mut hash: Hash, n: u64) -> Option<&BlockHeader> {
        for _ in 0..n {
            let ih = self.headers.get(&hash)?;
            if ih.header.height == 0 {
                break;
            }
            hash = ih.header.parent_hash;
        }
        self.headers.get(&hash).map(|ih| &ih.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64, parent_hash: Hash, bits: u32, nonce: u64) -> BlockHeader {
        BlockHeader {
            version: 1,
            height,
            parent_hash,
            merkle_root: [0u8; 32],
            timestamp: 1_700_000_000 + height,
            bits,
            nonce,
            extra_nonce: 0,
        }
    }

    const EASY_BITS: u32 = 0x2000_ffff;

    #[test]
    fn single_chain_extends_best_monotonically() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let h1 = header(1, genesis.hash(), EASY_BITS, 1);
        let outcome = index.insert(h1.clone()).unwrap();
        assert!(outcome.becomes_best);
        assert_eq!(index.best_hash(), h1.hash());
    }

    #[test]
    fn higher_work_fork_overtakes_tip() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let weak = header(1, genesis.hash(), EASY_BITS, 1);
        index.insert(weak.clone()).unwrap();

        // A harder (smaller target) sibling block outweighs the weak one
        // despite arriving second.
        let strong = header(1, genesis.hash(), 0x1f00_ffff, 1);
        let outcome = index.insert(strong.clone()).unwrap();
        assert!(outcome.becomes_best);
        assert_eq!(index.best_hash(), strong.hash());
    }

    #[test]
    fn equal_work_tie_keeps_earliest_arrival() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let first = header(1, genesis.hash(), EASY_BITS, 1);
        index.insert(first.clone()).unwrap();
        let second = header(1, genesis.hash(), EASY_BITS, 2);
        let outcome = index.insert(second).unwrap();
        assert!(!outcome.becomes_best);
        assert_eq!(index.best_hash(), first.hash());
    }

    #[test]
    fn lowest_common_ancestor_finds_fork_point_and_ordered_paths() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let a1 = header(1, genesis.hash(), EASY_BITS, 1);
        index.insert(a1.clone()).unwrap();
        let a2 = header(2, a1.hash(), EASY_BITS, 1);
        index.insert(a2.clone()).unwrap();

        let b1 = header(1, genesis.hash(), EASY_BITS, 99);
        index.insert(b1.clone()).unwrap();
        let b2 = header(2, b1.hash(), EASY_BITS, 1);
        index.insert(b2.clone()).unwrap();
        let b3 = header(3, b2.hash(), EASY_BITS, 1);
        index.insert(b3.clone()).unwrap();

        let (ancestor, old_path, new_path) = index.lowest_common_ancestor(a2.hash(), b3.hash()).unwrap();
        assert_eq!(ancestor, genesis.hash());
        assert_eq!(old_path, vec![a1.hash(), a2.hash()]);
        assert_eq!(new_path, vec![b1.hash(), b2.hash(), b3.hash()]);
    }

    #[test]
    fn mark_invalid_falls_back_to_next_best() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let weak = header(1, genesis.hash(), EASY_BITS, 1);
        index.insert(weak.clone()).unwrap();
        let strong = header(1, genesis.hash(), 0x1f00_ffff, 1);
        index.insert(strong.clone()).unwrap();
        assert_eq!(index.best_hash(), strong.hash());

        index.mark_invalid(strong.hash());
        assert_eq!(index.best_hash(), weak.hash());
    }

    #[test]
    fn the_invalid_set_evicts_the_oldest_marking_once_full() {
        let genesis = header(0, [0u8; 32], EASY_BITS, 0);
        let mut index = BlockIndex::new(&genesis);
        let first: Hash = [1u8; 32];
        index.mark_invalid(first);
        for i in 0..MAX_INVALID_HASHES {
            let mut h: Hash = [0u8; 32];
            h[..8].copy_from_slice(&(i as u64).to_be_bytes());
            h[8] = 0xff;
            index.mark_invalid(h);
        }
        assert!(!index.is_invalid(&first));
        assert_eq!(index.invalid_hashes().len(), MAX_INVALID_HASHES);
    }
}
