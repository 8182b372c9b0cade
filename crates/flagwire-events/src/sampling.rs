// crates/flagwire-events/src/sampling.rs
// ============================================================================
// Module: Flagwire Event Sampling
// Description: Ratio-based sampling decisions.
// Purpose: Decide whether a sampled action runs this time.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! A ratio of `n` keeps one in `n` occurrences. `None` and `1` always keep,
//! `0` never keeps, and negative ratios are treated as always-keep to fail
//! open on malformed flag data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;

// ============================================================================
// SECTION: Sampling
// ============================================================================

/// Returns true when this occurrence should be kept.
#[must_use]
pub(crate) fn sample_ratio(ratio: Option<i64>) -> bool {
    match ratio {
        None | Some(1) => true,
        Some(0) => false,
        Some(ratio) if ratio > 1 => rand::thread_rng().gen_range(0..ratio) == 0,
        Some(_) => true,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_and_missing_ratios_always_keep() {
        assert!(sample_ratio(None));
        assert!(sample_ratio(Some(1)));
        assert!(sample_ratio(Some(-2)));
    }

    #[test]
    fn zero_ratio_never_keeps() {
        for _ in 0..100 {
            assert!(!sample_ratio(Some(0)));
        }
    }

    #[test]
    fn large_ratio_keeps_some_of_many() {
        let kept = (0..10_000).filter(|_| sample_ratio(Some(10))).count();
        assert!(kept > 500 && kept < 2000, "kept {kept} of 10000 at 1-in-10");
    }
}
