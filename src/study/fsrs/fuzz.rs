//! Interval fuzz
//!
//! Spreads cards that would otherwise land on the same day across a small
//! window around the computed interval. The window grows in three tiers and
//! the pick is deterministic for a given seed.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Intervals below this are never fuzzed
const FUZZ_THRESHOLD: f64 = 2.5;

/// (start, end, factor) tiers of the fuzz window
const FUZZ_TIERS: [(f64, f64, f64); 3] = [
    (2.5, 7.0, 0.15),
    (7.0, 20.0, 0.10),
    (20.0, f64::MAX, 0.05),
];

/// Inclusive bounds of the fuzz window for an interval
pub fn fuzz_range(interval: u32, elapsed_days: u32, max_interval: u32) -> (u32, u32) {
    let ivl = f64::from(interval);
    if ivl < FUZZ_THRESHOLD {
        return (interval, interval);
    }

    let delta = FUZZ_TIERS.iter().fold(1.0, |acc, (start, end, factor)| {
        acc + factor * (ivl.min(*end) - start).max(0.0)
    });

    let mut min_ivl = ((ivl - delta).round() as u32).max(2);
    let mut max_ivl = (ivl + delta).round() as u32;

    if interval > elapsed_days && min_ivl <= elapsed_days {
        min_ivl = elapsed_days + 1;
    }
    max_ivl = max_ivl.min(max_interval);
    min_ivl = min_ivl.min(max_ivl);

    (min_ivl, max_ivl)
}

/// Pick a fuzzed interval inside the window
pub fn apply_fuzz(interval: u32, elapsed_days: u32, max_interval: u32, seed: u64) -> u32 {
    if f64::from(interval) < FUZZ_THRESHOLD {
        return interval;
    }
    let (lo, hi) = fuzz_range(interval, elapsed_days, max_interval);
    if lo == hi {
        return lo;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    rng.gen_range(lo..=hi)
}

/// Deterministic seed from the review moment and the card's memory state
pub fn fuzz_seed(now: DateTime<Utc>, reps: u32, difficulty: f64, stability: f64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp().to_le_bytes());
    hasher.update(u64::from(reps).to_le_bytes());
    hasher.update(difficulty.to_bits().to_le_bytes());
    hasher.update(stability.to_bits().to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_intervals_untouched() {
        assert_eq!(fuzz_range(1, 0, 365), (1, 1));
        assert_eq!(fuzz_range(2, 0, 365), (2, 2));
        assert_eq!(apply_fuzz(2, 0, 365, 42), 2);
    }

    #[test]
    fn test_range_tiers() {
        // 10 days: 1 + 0.15 * 4.5 + 0.10 * 3 = 1.975
        assert_eq!(fuzz_range(10, 0, 365), (8, 12));
        // 100 days: 1 + 0.675 + 1.3 + 0.05 * 80 = 6.975
        assert_eq!(fuzz_range(100, 0, 365), (93, 107));
    }

    #[test]
    fn test_range_respects_max_and_elapsed() {
        let (lo, hi) = fuzz_range(365, 0, 365);
        assert_eq!(hi, 365);
        assert!(lo < hi);

        let (lo, _) = fuzz_range(10, 9, 365);
        assert_eq!(lo, 10);
    }

    #[test]
    fn test_fuzz_is_deterministic_and_bounded() {
        let seed = fuzz_seed(Utc::now(), 3, 5.0, 12.0);
        let a = apply_fuzz(30, 0, 365, seed);
        let b = apply_fuzz(30, 0, 365, seed);
        assert_eq!(a, b);

        let (lo, hi) = fuzz_range(30, 0, 365);
        for s in 0..200u64 {
            let v = apply_fuzz(30, 0, 365, s);
            assert!(v >= lo && v <= hi);
        }
    }

    #[test]
    fn test_seed_depends_on_inputs() {
        let now = Utc::now();
        assert_eq!(fuzz_seed(now, 1, 5.0, 3.0), fuzz_seed(now, 1, 5.0, 3.0));
        assert_ne!(fuzz_seed(now, 1, 5.0, 3.0), fuzz_seed(now, 2, 5.0, 3.0));
    }
}
