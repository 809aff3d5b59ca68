//! Histogram statistics
//!
//! Client-side statistics computed over the raw samples of one flush
//! interval. Percentiles use a nearest-rank estimator:
//!
//! ```text
//! index = round_half_even(p * n) - 1, clamped to [0, n - 1]
//! ```
//!
//! This is not linear interpolation. Dashboards built on these series
//! depend on the exact values, so the estimator must not change.

use serde::{Deserialize, Serialize};

/// Statistic emitted as its own `<name>.<label>` series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramAggregate {
    Min,
    Max,
    Avg,
    Count,
    Sum,
    Median,
}

impl HistogramAggregate {
    /// Emission order on flush
    pub const FLUSH_ORDER: [HistogramAggregate; 6] = [
        HistogramAggregate::Min,
        HistogramAggregate::Max,
        HistogramAggregate::Sum,
        HistogramAggregate::Count,
        HistogramAggregate::Avg,
        HistogramAggregate::Median,
    ];

    /// Series name suffix
    pub fn label(&self) -> &'static str {
        match self {
            HistogramAggregate::Min => "min",
            HistogramAggregate::Max => "max",
            HistogramAggregate::Avg => "avg",
            HistogramAggregate::Count => "count",
            HistogramAggregate::Sum => "sum",
            HistogramAggregate::Median => "median",
        }
    }
}

/// Which statistics and percentiles a histogram emits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    /// Statistics to emit (default: all six)
    pub aggregates: Vec<HistogramAggregate>,
    /// Percentiles in 0.0..=1.0 (default: 0.75, 0.85, 0.95, 0.99)
    pub percentiles: Vec<f64>,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        HistogramOptions {
            aggregates: vec![
                HistogramAggregate::Min,
                HistogramAggregate::Max,
                HistogramAggregate::Avg,
                HistogramAggregate::Count,
                HistogramAggregate::Sum,
                HistogramAggregate::Median,
            ],
            percentiles: vec![0.75, 0.85, 0.95, 0.99],
        }
    }
}

impl HistogramOptions {
    pub fn new(aggregates: Vec<HistogramAggregate>, percentiles: Vec<f64>) -> Self {
        HistogramOptions {
            aggregates,
            percentiles,
        }
    }

    pub fn contains(&self, aggregate: HistogramAggregate) -> bool {
        self.aggregates.contains(&aggregate)
    }
}

/// Nearest-rank percentile over ascending samples
///
/// Returns `None` only for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    // Ties round to even: 2.5 -> 2, 3.5 -> 4
    let rank = (p * n as f64).round_ties_even();
    let index = if rank.is_nan() || rank < 1.0 {
        0
    } else {
        (rank as usize - 1).min(n - 1)
    };
    debug_assert!(index < n, "percentile index {} out of bounds for {}", index, n);
    Some(sorted[index])
}

/// Series suffix for a percentile, e.g. `0.95` -> `95percentile`
pub fn percentile_label(p: f64) -> String {
    format!("{}percentile", (p * 100.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_nearest_rank() {
        let samples: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        assert_eq!(percentile(&samples, 0.95), Some(95.0));
        assert_eq!(percentile(&samples, 0.99), Some(99.0));
        assert_eq!(percentile(&samples, 0.5), Some(50.0));
    }

    #[test]
    fn test_percentile_clamps() {
        let samples = [1.0, 2.0, 3.0];
        // round(0.1 * 3) - 1 = -1 -> 0
        assert_eq!(percentile(&samples, 0.1), Some(1.0));
        assert_eq!(percentile(&samples, 0.0), Some(1.0));
        assert_eq!(percentile(&samples, 1.0), Some(3.0));
        assert_eq!(percentile(&samples, 7.5), Some(3.0));
        assert_eq!(percentile(&samples, -1.0), Some(1.0));
    }

    #[test]
    fn test_percentile_rounds_half_to_even() {
        // 0.5 * 5 = 2.5 rounds to 2, index 1
        let five = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_eq!(percentile(&five, 0.5), Some(20.0));
        // 0.5 * 3 = 1.5 rounds to 2, index 1
        let three = [1.0, 3.0, 5.0];
        assert_eq!(percentile(&three, 0.5), Some(3.0));
        // 0.5 * 7 = 3.5 rounds to 4, index 3
        let seven = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert_eq!(percentile(&seven, 0.5), Some(4.0));
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_percentile_labels() {
        assert_eq!(percentile_label(0.75), "75percentile");
        assert_eq!(percentile_label(0.95), "95percentile");
        assert_eq!(percentile_label(0.999), "100percentile");
        assert_eq!(percentile_label(0.5), "50percentile");
    }

    #[test]
    fn test_default_options() {
        let options = HistogramOptions::default();
        assert_eq!(options.aggregates.len(), 6);
        assert_eq!(options.percentiles, vec![0.75, 0.85, 0.95, 0.99]);
    }

    #[test]
    fn test_options_deserialize_partial() {
        let options: HistogramOptions =
            serde_json::from_str(r#"{"aggregates": ["min", "max"]}"#).unwrap();
        assert_eq!(
            options.aggregates,
            vec![HistogramAggregate::Min, HistogramAggregate::Max]
        );
        assert_eq!(options.percentiles.len(), 4);
    }
}
