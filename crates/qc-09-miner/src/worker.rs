//! A single mining worker: repeatedly asks the compute engine to search a
//! batch of its assigned nonce subrange, checking the template's sequence
//! counter between batches so a new tip aborts the search promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use qc_compute::tasks::mining::MiningTask;
use qc_compute::ComputeEngine;

use crate::template::{ActiveTemplate, TemplateSlot};

#[derive(Debug, Clone, Copy)]
pub struct MinedNonce {
    pub seq: u64,
    pub nonce: u64,
}

/// Runs until `stop` is set or a nonce is found, owning the nonce subrange
/// `[subrange_start, subrange_start + subrange_len)` within `u64`'s full
/// range (every worker's subrange is disjoint — see
/// [`crate::pool::nonce_subranges`]). Returns `None` if `stop` fired first.
pub fn mine(
    engine: &Arc<dyn ComputeEngine>,
    slot: &TemplateSlot,
    subrange_start: u64,
    subrange_len: u64,
    batch_size: u64,
    stop: &AtomicBool,
) -> Option<MinedNonce> {
    let mut template: ActiveTemplate = wait_for_template(slot, stop)?;
    let mut cursor = subrange_start;
    let subrange_end = subrange_start.saturating_add(subrange_len);

    loop {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        if slot.seq() != template.seq {
            template = wait_for_template(slot, stop)?;
            cursor = subrange_start;
            continue;
        }
        if cursor >= subrange_end {
            // Exhausted this worker's slice of the nonce space for the
            // current template without a hit; rotate extra_nonce and
            // keep going rather than spin on an exhausted range.
            template.header.extra_nonce = template.header.extra_nonce.wrapping_add(1);
            cursor = subrange_start;
        }

        let remaining = subrange_end - cursor;
        let task = MiningTask {
            header_template: template.header.mining_template_bytes(),
            target: template.target,
            nonce_start: cursor,
            nonce_count: remaining.min(batch_size),
        };
        cursor += task.nonce_count;

        let hashed = task.nonce_count;
        let found = task.execute(engine);
        quantum_telemetry::HASHES_COMPUTED.inc_by(hashed as f64);
        if let Some(result) = found {
            return Some(MinedNonce { seq: template.seq, nonce: result.nonce });
        }
    }
}

fn wait_for_template(slot: &TemplateSlot, stop: &AtomicBool) -> Option<ActiveTemplate> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        if let Some(tpl) = slot.snapshot() {
            return Some(tpl);
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;
    use qc_06_block::BlockHeader;

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            height: 1,
            parent_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 1_700_000_000,
            bits: 0x2000_ffff,
            nonce: 0,
            extra_nonce: 0,
        }
    }

    #[test]
    fn an_easy_target_is_found_within_the_assigned_subrange() {
        let slot = TemplateSlot::new();
        slot.publish(ActiveTemplate { seq: 1, header: header(), transactions: vec![], target: U256::MAX / 4 });
        let engine = qc_compute::cpu_engine();
        let stop = AtomicBool::new(false);

        let result = mine(&engine, &slot, 0, 1_000_000, 200_000, &stop).expect("should find a nonce");
        assert_eq!(result.seq, 1);
    }

    #[test]
    fn a_stop_signal_aborts_without_a_template() {
        let slot = TemplateSlot::new();
        let engine = qc_compute::cpu_engine();
        let stop = AtomicBool::new(true);

        assert!(mine(&engine, &slot, 0, 1_000, 100, &stop).is_none());
    }
}
