//! Property-based tests for the time-in-range partition
//!
//! Every finite value lands in exactly one band and the band boundaries keep
//! their documented open/closed sides.

use tidex_domain::tir::{TirCategory, TirThresholds};
use proptest::prelude::*;

fn in_band(value: f64, category: TirCategory, t: &TirThresholds) -> bool {
    match category {
        TirCategory::VeryLow => value < t.very_low,
        TirCategory::Low => value >= t.very_low && value < t.low,
        TirCategory::High => value > t.high && value <= t.very_high,
        TirCategory::VeryHigh => value > t.very_high,
        TirCategory::Target => value >= t.low && value <= t.high,
    }
}

proptest! {
    /// Exactly one band predicate holds, and it is the classified one
    #[test]
    fn classification_is_a_partition(value in -50.0f64..80.0) {
        let thresholds = TirThresholds::default();
        let classified = TirCategory::classify(value, &thresholds);

        let matching: Vec<_> = TirCategory::ALL
            .iter()
            .filter(|c| in_band(value, **c, &thresholds))
            .collect();

        prop_assert_eq!(matching.len(), 1);
        prop_assert_eq!(*matching[0], classified);
    }

    /// Classification is monotonic in the value
    #[test]
    fn classification_is_monotonic(a in 0.0f64..30.0, b in 0.0f64..30.0) {
        let thresholds = TirThresholds::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |c: TirCategory| TirCategory::ALL.iter().position(|x| *x == c).unwrap();

        prop_assert!(
            rank(TirCategory::classify(lo, &thresholds)) <= rank(TirCategory::classify(hi, &thresholds))
        );
    }
}

#[test]
fn very_low_threshold_is_low() {
    let t = TirThresholds::default();
    assert_eq!(TirCategory::classify(t.very_low, &t), TirCategory::Low);
}

#[test]
fn high_threshold_is_target() {
    let t = TirThresholds::default();
    assert_eq!(TirCategory::classify(t.high, &t), TirCategory::Target);
}

#[test]
fn very_high_threshold_is_high() {
    let t = TirThresholds::default();
    assert_eq!(TirCategory::classify(t.very_high, &t), TirCategory::High);
}
