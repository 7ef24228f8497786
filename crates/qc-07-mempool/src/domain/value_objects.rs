//! Ordering key for the fee-rate index.

use shared_types::Hash;
use std::cmp::Ordering;

/// Orders pool entries by fee rate ascending (so `BTreeSet::iter().next()`
/// is always the cheapest entry, the first one eviction reaches for), then
/// by insertion order (FIFO among equal fee rates), then by hash for a
/// fully deterministic tie-break.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FeeRateKey {
    pub fee_per_byte: u64,
    pub added_at: u64,
    pub hash: Hash,
}

impl Ord for FeeRateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fee_per_byte
            .cmp(&other.fee_per_byte)
            .then_with(|| self.added_at.cmp(&other.added_at))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for FeeRateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
