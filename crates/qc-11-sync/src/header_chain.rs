//! Validates a header run before any block body is fetched for it —
//! "pipeline validation" per the spec: don't spend a round trip on a
//! block body until the header claiming to produce it has already been
//! checked for linkage and proof of work.

use qc_06_block::{validate_header, BlockHeader, HeaderContext};
use shared_types::CoreError;

/// Checks that `headers` is a contiguous run starting immediately after
/// `parent`: each header's parent hash and height must match the one
/// before it, and each must clear its own declared PoW target.
/// Doesn't check `bits` against the chain's difficulty schedule — that
/// happens when the block body is actually submitted to
/// `qc_08_chain::ChainManager`, which is the single source of truth for
/// expected difficulty at a height.
pub fn validate_header_run(parent: &BlockHeader, headers: &[BlockHeader], now: u64) -> Result<(), CoreError> {
    let mut prev = parent.clone();
    for header in headers {
        let ctx = HeaderContext { parent_height: prev.height, parent_hash: prev.hash(), now, max_future_skew_secs: 2 * 60 * 60 };
        validate_header(header, &ctx)?;
        prev = header.clone();
    }
    Ok(())
}
