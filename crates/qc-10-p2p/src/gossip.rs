//! Seen-hash dedup for `MR` announcements. Transactions already have a
//! canonical home in `qc_07_mempool::TransactionPool::contains`; this
//! cache exists for block hashes, which have no equivalent always-on
//! index to query (the chain only knows blocks it has already accepted,
//! not ones merely announced and not yet fetched).

use std::collections::VecDeque;
use std::collections::HashSet;

use shared_types::Hash;

/// Bounded FIFO of recently seen block hashes. Unlike the old block
/// propagation cache this replaces, there is no reputation or timing
/// tracking here — the syncer, not the gossip layer, decides whether an
/// announced block is worth fetching.
pub struct SeenBlocks {
    set: HashSet<Hash>,
    order: VecDeque<Hash>,
    capacity: usize,
}

impl SeenBlocks {
    pub fn new(capacity: usize) -> Self {
        Self { set: HashSet::new(), order: VecDeque::new(), capacity: capacity.max(1) }
    }

    /// Marks `hash` seen, evicting the oldest entry if at capacity.
    /// Returns `true` if this is the first time `hash` has been seen.
    pub fn insert(&mut self, hash: Hash) -> bool {
        if !self.set.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.set.remove(&oldest);
            }
        }
        true
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.set.contains(hash)
    }
}
