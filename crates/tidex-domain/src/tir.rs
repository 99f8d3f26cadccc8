//! Time-in-range (TIR) categories, thresholds and per-user results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Glucose band a sample falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TirCategory {
    /// Below `veryLow`
    VeryLow,
    /// `[veryLow, low)`
    Low,
    /// Everything not in another band
    Target,
    /// `(high, veryHigh]`
    High,
    /// Above `veryHigh`
    VeryHigh,
}

impl TirCategory {
    /// All categories, low to high
    pub const ALL: [TirCategory; 5] = [
        TirCategory::VeryLow,
        TirCategory::Low,
        TirCategory::Target,
        TirCategory::High,
        TirCategory::VeryHigh,
    ];

    /// Wire name of the category
    pub fn as_str(self) -> &'static str {
        match self {
            TirCategory::VeryLow => "veryLow",
            TirCategory::Low => "low",
            TirCategory::Target => "target",
            TirCategory::High => "high",
            TirCategory::VeryHigh => "veryHigh",
        }
    }

    /// Classify one sample value.
    ///
    /// Low-side bands are closed at their lower bound and high-side bands at
    /// their upper bound: `veryLow` itself is `Low`, `high` itself is `Target`.
    pub fn classify(value: f64, thresholds: &TirThresholds) -> Self {
        if value < thresholds.very_low {
            TirCategory::VeryLow
        } else if value < thresholds.low {
            TirCategory::Low
        } else if value > thresholds.very_high {
            TirCategory::VeryHigh
        } else if value > thresholds.high {
            TirCategory::High
        } else {
            TirCategory::Target
        }
    }
}

impl std::fmt::Display for TirCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band boundaries, in mmol/L
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TirThresholds {
    /// Upper bound (exclusive) of `veryLow`
    pub very_low: f64,
    /// Upper bound (exclusive) of `low`
    pub low: f64,
    /// Lower bound (exclusive) of `high`
    pub high: f64,
    /// Lower bound (exclusive) of `veryHigh`
    pub very_high: f64,
}

impl Default for TirThresholds {
    fn default() -> Self {
        Self {
            very_low: 3.0,
            low: 3.9,
            high: 10.0,
            very_high: 13.9,
        }
    }
}

impl TirThresholds {
    /// Boundaries must be strictly increasing and finite
    pub fn is_ordered(&self) -> bool {
        let bounds = [self.very_low, self.low, self.high, self.very_high];
        bounds.iter().all(|b| b.is_finite()) && bounds.windows(2).all(|w| w[0] < w[1])
    }
}

/// One value per TIR category
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TirCategories<T> {
    /// `veryLow` value
    pub very_low: T,
    /// `low` value
    pub low: T,
    /// `target` value
    pub target: T,
    /// `high` value
    pub high: T,
    /// `veryHigh` value
    pub very_high: T,
}

impl<T> TirCategories<T> {
    /// Value for `category`
    pub fn get(&self, category: TirCategory) -> &T {
        match category {
            TirCategory::VeryLow => &self.very_low,
            TirCategory::Low => &self.low,
            TirCategory::Target => &self.target,
            TirCategory::High => &self.high,
            TirCategory::VeryHigh => &self.very_high,
        }
    }

    /// Mutable value for `category`
    pub fn get_mut(&mut self, category: TirCategory) -> &mut T {
        match category {
            TirCategory::VeryLow => &mut self.very_low,
            TirCategory::Low => &mut self.low,
            TirCategory::Target => &mut self.target,
            TirCategory::High => &mut self.high,
            TirCategory::VeryHigh => &mut self.very_high,
        }
    }

    /// Apply `f` to every category
    pub fn map<U>(&self, mut f: impl FnMut(TirCategory, &T) -> U) -> TirCategories<U> {
        TirCategories {
            very_low: f(TirCategory::VeryLow, &self.very_low),
            low: f(TirCategory::Low, &self.low),
            target: f(TirCategory::Target, &self.target),
            high: f(TirCategory::High, &self.high),
            very_high: f(TirCategory::VeryHigh, &self.very_high),
        }
    }
}

/// Per-user time-in-range statistics
///
/// When [`total`](Self::total) is zero every `rate` entry is non-finite;
/// callers must read that as "no data", never as `0%`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TirAggregateResult {
    /// Owner of the samples
    pub user_id: String,
    /// Latest qualifying sample time across all categories
    pub last_cbg_time: Option<DateTime<Utc>>,
    /// Samples per category
    pub count: TirCategories<u64>,
    /// Latest sample time per category
    pub last_time: TirCategories<Option<DateTime<Utc>>>,
    /// `count / total * 100` per category
    pub rate: TirCategories<f64>,
    /// `count * samplingInterval` minutes per category
    pub total_time: TirCategories<u64>,
}

impl TirAggregateResult {
    /// Derive rates and durations from grouped counts
    pub fn from_groups(
        user_id: impl Into<String>,
        count: TirCategories<u64>,
        last_time: TirCategories<Option<DateTime<Utc>>>,
        sampling_interval_minutes: u32,
    ) -> Self {
        let total: u64 = TirCategory::ALL.iter().map(|c| *count.get(*c)).sum();
        let last_cbg_time = TirCategory::ALL
            .iter()
            .filter_map(|c| *last_time.get(*c))
            .max();

        Self {
            user_id: user_id.into(),
            last_cbg_time,
            rate: count.map(|_, n| *n as f64 / total as f64 * 100.0),
            total_time: count.map(|_, n| n * u64::from(sampling_interval_minutes)),
            count,
            last_time,
        }
    }

    /// Sum of all category counts
    pub fn total(&self) -> u64 {
        TirCategory::ALL.iter().map(|c| *self.count.get(*c)).sum()
    }

    /// At least one qualifying sample
    pub fn has_data(&self) -> bool {
        self.total() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classification_boundaries() {
        let t = TirThresholds::default();

        assert_eq!(TirCategory::classify(2.9, &t), TirCategory::VeryLow);
        assert_eq!(TirCategory::classify(3.0, &t), TirCategory::Low);
        assert_eq!(TirCategory::classify(3.9, &t), TirCategory::Target);
        assert_eq!(TirCategory::classify(10.0, &t), TirCategory::Target);
        assert_eq!(TirCategory::classify(10.1, &t), TirCategory::High);
        assert_eq!(TirCategory::classify(13.9, &t), TirCategory::High);
        assert_eq!(TirCategory::classify(14.0, &t), TirCategory::VeryHigh);
    }

    #[test]
    fn test_default_thresholds_ordered() {
        assert!(TirThresholds::default().is_ordered());
        let broken = TirThresholds {
            low: 2.0,
            ..TirThresholds::default()
        };
        assert!(!broken.is_ordered());
    }

    #[test]
    fn test_from_groups_rates_and_durations() {
        let count = TirCategories {
            very_low: 2,
            low: 2,
            target: 2,
            high: 2,
            very_high: 2,
        };
        let last = Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap();
        let mut last_time = TirCategories::default();
        *last_time.get_mut(TirCategory::High) = Some(last);

        let result = TirAggregateResult::from_groups("u1", count, last_time, 5);

        assert_eq!(result.total(), 10);
        assert_eq!(result.rate.very_low, 20.0);
        assert_eq!(result.total_time.very_low, 10);
        assert_eq!(result.last_cbg_time, Some(last));
    }

    #[test]
    fn test_zero_total_rate_is_not_finite() {
        let result =
            TirAggregateResult::from_groups("u1", TirCategories::default(), TirCategories::default(), 5);

        assert_eq!(result.total(), 0);
        assert!(!result.has_data());
        assert!(TirCategory::ALL.iter().all(|c| !result.rate.get(*c).is_finite()));
        assert_eq!(result.last_cbg_time, None);
    }

    #[test]
    fn test_result_wire_names() {
        let result =
            TirAggregateResult::from_groups("u1", TirCategories::default(), TirCategories::default(), 5);
        let json = serde_json::to_value(&result).unwrap();

        assert!(json.get("lastCbgTime").is_some());
        assert!(json["count"].get("veryHigh").is_some());
        assert!(json["totalTime"].get("veryLow").is_some());
    }
}
