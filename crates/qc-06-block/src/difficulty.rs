//! Compact-to-256-bit target mapping, the subsidy/halving schedule, and
//! difficulty retargeting.
//!
//! **The target is a ceiling, not a floor**: `H(header) <= target` must
//! hold for a block to be valid proof of work. A *smaller* target number is
//! *harder* to hit (fewer valid hashes), a *larger* one is *easier*.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Parameters governing subsidy issuance and difficulty retargeting. Values
/// are per-network (mainnet/testnet/dev); `node-runtime` supplies the
/// concrete table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub initial_subsidy: u64,
    pub halving_interval: u64,
    pub target_block_time_secs: u64,
    pub retarget_window: u64,
    /// Number of trailing blocks' timestamps used to measure actual elapsed
    /// time at a retarget boundary.
    pub measurement_window: u64,
    /// Proportional-controller gain: how aggressively the next target
    /// reacts to the ratio of actual to expected elapsed time.
    pub kp: f64,
    /// Per-retarget change is clamped to `[1/max_adjustment_factor,
    /// max_adjustment_factor]`.
    pub max_adjustment_factor: u64,
    pub initial_bits: u32,
    pub min_bits: u32,
    pub max_bits: u32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            initial_subsidy: 50 * 100_000_000,
            halving_interval: 210_000,
            target_block_time_secs: 60,
            retarget_window: 2_016,
            measurement_window: 2_016,
            kp: 1.0,
            max_adjustment_factor: 4,
            // 2^224 or so: an easy starting target for a dev/test network.
            initial_bits: 0x1f00_ffff,
            min_bits: 0x1b00_ffff,
            max_bits: 0x2000_ffff,
        }
    }
}

/// `subsidy(height) = initial_subsidy >> (height / halving_interval)`,
/// clamped to 0 once the shift would exceed a u64's width.
pub fn subsidy(cfg: &DifficultyConfig, height: u64) -> u64 {
    let halvings = height / cfg.halving_interval;
    if halvings >= 64 {
        0
    } else {
        cfg.initial_subsidy >> halvings
    }
}

/// Expands a compact (Bitcoin-style nBits) target into its 256-bit form:
/// the high byte is an exponent, the low 3 bytes are a mantissa, and
/// `target = mantissa * 256^(exponent - 3)`.
pub fn target_from_bits(bits: u32) -> U256 {
    let exponent = (bits >> 24) as u32;
    let mantissa = U256::from(bits & 0x00ff_ffff);
    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent))
    } else {
        mantissa << (8 * (exponent - 3))
    }
}

/// Compresses a 256-bit target back into its compact form. Inverse of
/// [`target_from_bits`] up to the mantissa's 3-byte precision.
pub fn bits_from_target(target: U256) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let mut exponent = (target.bits() as u32).div_ceil(8);
    let mut mantissa = if exponent <= 3 {
        (target << (8 * (3 - exponent))).low_u32()
    } else {
        (target >> (8 * (exponent - 3))).low_u32()
    };
    // The mantissa's sign bit (bit 23) must stay clear, matching Bitcoin's
    // nBits encoding; shift down and bump the exponent if it would be set.
    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }
    (exponent << 24) | (mantissa & 0x007f_ffff)
}

/// Recomputes the target for the block starting a new retarget window,
/// given the timestamps of the window's first and last measured blocks
/// (`oldest` to `newest`, both inclusive boundaries of `measurement_window`
/// blocks). Returns the unchanged `bits` everywhere else in the window.
pub fn retarget(cfg: &DifficultyConfig, current_bits: u32, oldest_timestamp: u64, newest_timestamp: u64) -> u32 {
    let expected = (cfg.measurement_window.saturating_sub(1)) * cfg.target_block_time_secs;
    if expected == 0 {
        return current_bits;
    }
    let actual = newest_timestamp.saturating_sub(oldest_timestamp).max(1);

    let ratio = 1.0 + cfg.kp * (actual as f64 / expected as f64 - 1.0);
    let min_ratio = 1.0 / cfg.max_adjustment_factor as f64;
    let max_ratio = cfg.max_adjustment_factor as f64;
    let clamped_ratio = ratio.clamp(min_ratio, max_ratio);

    let current_target = target_from_bits(current_bits);
    // Scale by a rational approximation of clamped_ratio to stay in integer
    // arithmetic: multiply by a fixed-point numerator/denominator pair.
    const SCALE: u64 = 1_000_000;
    let numerator = (clamped_ratio * SCALE as f64).round() as u64;
    let new_target = (current_target.saturating_mul(U256::from(numerator))) / U256::from(SCALE);

    let bits = bits_from_target(new_target);
    bits.clamp(cfg.min_bits.min(cfg.max_bits), cfg.max_bits.max(cfg.min_bits))
}

/// Whether a retarget boundary falls at `height` (the first block of a new
/// window recomputes difficulty from the prior window's measurements).
pub fn is_retarget_height(cfg: &DifficultyConfig, height: u64) -> bool {
    height > 0 && height % cfg.retarget_window == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsidy_halves_on_schedule() {
        let cfg = DifficultyConfig::default();
        assert_eq!(subsidy(&cfg, 0), cfg.initial_subsidy);
        assert_eq!(subsidy(&cfg, cfg.halving_interval), cfg.initial_subsidy / 2);
        assert_eq!(subsidy(&cfg, cfg.halving_interval * 2), cfg.initial_subsidy / 4);
    }

    #[test]
    fn subsidy_clamps_to_zero_after_enough_halvings() {
        let cfg = DifficultyConfig::default();
        assert_eq!(subsidy(&cfg, cfg.halving_interval * 64), 0);
    }

    #[test]
    fn bits_round_trip_through_target() {
        let bits = 0x1d00_ffffu32;
        let target = target_from_bits(bits);
        assert_eq!(bits_from_target(target), bits);
    }

    #[test]
    fn fast_blocks_lower_the_target() {
        let cfg = DifficultyConfig {
            measurement_window: 10,
            target_block_time_secs: 60,
            kp: 1.0,
            max_adjustment_factor: 4,
            ..Default::default()
        };
        let current_bits = cfg.initial_bits;
        // 9 intervals of 30s each instead of 60s: blocks arrived 2x too fast.
        let new_bits = retarget(&cfg, current_bits, 0, 9 * 30);
        assert!(target_from_bits(new_bits) < target_from_bits(current_bits));
    }

    #[test]
    fn slow_blocks_raise_the_target() {
        let cfg = DifficultyConfig {
            measurement_window: 10,
            target_block_time_secs: 60,
            kp: 1.0,
            max_adjustment_factor: 4,
            ..Default::default()
        };
        let current_bits = cfg.initial_bits;
        let new_bits = retarget(&cfg, current_bits, 0, 9 * 120);
        assert!(target_from_bits(new_bits) > target_from_bits(current_bits));
    }

    #[test]
    fn retarget_height_only_at_window_boundaries() {
        let cfg = DifficultyConfig {
            retarget_window: 100,
            ..Default::default()
        };
        assert!(!is_retarget_height(&cfg, 0));
        assert!(!is_retarget_height(&cfg, 99));
        assert!(is_retarget_height(&cfg, 100));
        assert!(is_retarget_height(&cfg, 200));
    }
}
