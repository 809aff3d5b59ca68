//! Per-kind accumulators
//!
//! Every live aggregation key owns exactly one `Aggregator`. The variant is
//! chosen once, from the `MetricKind` of the first measurement for that key,
//! and never changes until the key is drained.
//!
//! | Kind         | Variant       | Flush output                          |
//! |--------------|---------------|---------------------------------------|
//! | Gauge        | `Latest`      | 1 gauge point, last value             |
//! | Counter      | `Sum`         | 1 count point, truncated sum          |
//! | Histogram    | `Statistical` | 1 series per statistic / percentile   |
//! | Distribution | `RawBucketed` | 1 series, 1 point per second bucket   |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use super::histogram::{percentile, percentile_label, HistogramAggregate, HistogramOptions};
use super::types::{
    unix_seconds, DistributionPoint, MetricKind, MetricPoint, Series, SeriesPoints, SeriesType,
};

/// Capability shared by all accumulators
pub trait Accumulate {
    /// Fold one value in. Must accept any finite or non-finite value.
    fn accumulate(&mut self, value: f64, timestamp: SystemTime);

    /// Produce the series for everything accumulated so far
    fn flush(&mut self, identity: &SeriesIdentity) -> Vec<Series>;
}

/// Name, tags and host shared by every series an aggregator emits
#[derive(Debug, Clone)]
pub struct SeriesIdentity {
    pub metric: String,
    /// Tags as supplied by the measurement that created the key
    pub tags: Vec<String>,
    pub host: Arc<str>,
}

impl SeriesIdentity {
    fn scalar(&self, suffix: Option<&str>, series_type: SeriesType, point: MetricPoint) -> Series {
        let metric = match suffix {
            Some(suffix) => format!("{}.{}", self.metric, suffix),
            None => self.metric.clone(),
        };
        Series {
            metric,
            series_type,
            points: SeriesPoints::Scalar(vec![point]),
            tags: self.tags.clone(),
            host: self.host.to_string(),
        }
    }
}

// ============================================================================
// Latest (gauge)
// ============================================================================

/// Keeps only the most recent value
#[derive(Debug, Clone, Default)]
pub struct LatestAggregator {
    value: f64,
    last_timestamp: i64,
}

impl Accumulate for LatestAggregator {
    fn accumulate(&mut self, value: f64, timestamp: SystemTime) {
        self.value = value;
        self.last_timestamp = unix_seconds(timestamp);
    }

    fn flush(&mut self, identity: &SeriesIdentity) -> Vec<Series> {
        let point = MetricPoint {
            timestamp: self.last_timestamp,
            value: self.value,
        };
        vec![identity.scalar(None, SeriesType::Gauge, point)]
    }
}

// ============================================================================
// Sum (counter)
// ============================================================================

/// Sums values after truncating each one to an integer
///
/// Fractional increments are dropped at accumulation time, so 0.9 + 0.9
/// sums to 0.
#[derive(Debug, Clone, Default)]
pub struct SumAggregator {
    sum: i64,
    last_timestamp: i64,
}

impl SumAggregator {
    pub fn sum(&self) -> i64 {
        self.sum
    }
}

impl Accumulate for SumAggregator {
    fn accumulate(&mut self, value: f64, timestamp: SystemTime) {
        // `as` truncates toward zero, saturates at the bounds and maps NaN to 0
        self.sum = self.sum.saturating_add(value as i64);
        self.last_timestamp = unix_seconds(timestamp);
    }

    fn flush(&mut self, identity: &SeriesIdentity) -> Vec<Series> {
        let point = MetricPoint {
            timestamp: self.last_timestamp,
            value: self.sum as f64,
        };
        vec![identity.scalar(None, SeriesType::Count, point)]
    }
}

// ============================================================================
// Statistical (histogram)
// ============================================================================

/// Retains every sample and derives statistics on flush
#[derive(Debug, Clone)]
pub struct StatisticalAggregator {
    samples: Vec<f64>,
    options: Arc<HistogramOptions>,
    last_timestamp: i64,
}

impl StatisticalAggregator {
    pub fn new(options: Arc<HistogramOptions>) -> Self {
        StatisticalAggregator {
            samples: Vec::new(),
            options,
            last_timestamp: 0,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Accumulate for StatisticalAggregator {
    fn accumulate(&mut self, value: f64, timestamp: SystemTime) {
        self.samples.push(value);
        self.last_timestamp = unix_seconds(timestamp);
    }

    fn flush(&mut self, identity: &SeriesIdentity) -> Vec<Series> {
        if self.samples.is_empty() {
            return Vec::new();
        }

        let mut samples = std::mem::take(&mut self.samples);
        samples.sort_unstable_by(f64::total_cmp);

        let count = samples.len();
        let sum: f64 = samples.iter().sum();
        let timestamp = self.last_timestamp;
        let point = |value: f64| MetricPoint { timestamp, value };

        let mut result =
            Vec::with_capacity(self.options.aggregates.len() + self.options.percentiles.len());

        for aggregate in HistogramAggregate::FLUSH_ORDER {
            if !self.options.contains(aggregate) {
                continue;
            }
            let (value, series_type) = match aggregate {
                HistogramAggregate::Min => (samples[0], SeriesType::Gauge),
                HistogramAggregate::Max => (samples[count - 1], SeriesType::Gauge),
                HistogramAggregate::Sum => (sum, SeriesType::Gauge),
                HistogramAggregate::Count => (count as f64, SeriesType::Count),
                HistogramAggregate::Avg => (sum / count as f64, SeriesType::Gauge),
                HistogramAggregate::Median => {
                    (percentile(&samples, 0.5).unwrap_or(0.0), SeriesType::Gauge)
                }
            };
            result.push(identity.scalar(Some(aggregate.label()), series_type, point(value)));
        }

        for &p in &self.options.percentiles {
            let value = percentile(&samples, p).unwrap_or(0.0);
            let label = percentile_label(p);
            result.push(identity.scalar(Some(label.as_str()), SeriesType::Gauge, point(value)));
        }

        result
    }
}

// ============================================================================
// RawBucketed (distribution)
// ============================================================================

/// Groups raw values by whole second; no local statistics
#[derive(Debug, Clone, Default)]
pub struct RawBucketedAggregator {
    buckets: BTreeMap<i64, Vec<f64>>,
}

impl RawBucketedAggregator {
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl Accumulate for RawBucketedAggregator {
    fn accumulate(&mut self, value: f64, timestamp: SystemTime) {
        self.buckets
            .entry(unix_seconds(timestamp))
            .or_default()
            .push(value);
    }

    fn flush(&mut self, identity: &SeriesIdentity) -> Vec<Series> {
        if self.buckets.is_empty() {
            return Vec::new();
        }

        // BTreeMap iterates in ascending timestamp order
        let points = std::mem::take(&mut self.buckets)
            .into_iter()
            .map(|(timestamp, values)| DistributionPoint { timestamp, values })
            .collect();

        vec![Series {
            metric: identity.metric.clone(),
            // Not sent on the distribution endpoint
            series_type: SeriesType::Gauge,
            points: SeriesPoints::Distribution(points),
            tags: identity.tags.clone(),
            host: identity.host.to_string(),
        }]
    }
}

// ============================================================================
// Aggregator
// ============================================================================

#[derive(Debug, Clone)]
enum AggregatorState {
    Latest(LatestAggregator),
    Sum(SumAggregator),
    Statistical(StatisticalAggregator),
    RawBucketed(RawBucketedAggregator),
}

/// Accumulator for one aggregation key
#[derive(Debug, Clone)]
pub struct Aggregator {
    kind: MetricKind,
    identity: SeriesIdentity,
    state: AggregatorState,
}

impl Aggregator {
    /// Create the accumulator matching `kind`
    ///
    /// `histogram` is only consulted for `MetricKind::Histogram`.
    pub fn new(
        kind: MetricKind,
        identity: SeriesIdentity,
        histogram: Arc<HistogramOptions>,
    ) -> Self {
        let state = match kind {
            MetricKind::Gauge => AggregatorState::Latest(LatestAggregator::default()),
            MetricKind::Counter => AggregatorState::Sum(SumAggregator::default()),
            MetricKind::Histogram => {
                AggregatorState::Statistical(StatisticalAggregator::new(histogram))
            }
            MetricKind::Distribution => {
                AggregatorState::RawBucketed(RawBucketedAggregator::default())
            }
        };
        Aggregator {
            kind,
            identity,
            state,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn identity(&self) -> &SeriesIdentity {
        &self.identity
    }

    pub fn accumulate(&mut self, value: f64, timestamp: SystemTime) {
        match &mut self.state {
            AggregatorState::Latest(a) => a.accumulate(value, timestamp),
            AggregatorState::Sum(a) => a.accumulate(value, timestamp),
            AggregatorState::Statistical(a) => a.accumulate(value, timestamp),
            AggregatorState::RawBucketed(a) => a.accumulate(value, timestamp),
        }
    }

    pub fn flush(&mut self) -> Vec<Series> {
        let identity = &self.identity;
        match &mut self.state {
            AggregatorState::Latest(a) => a.flush(identity),
            AggregatorState::Sum(a) => a.flush(identity),
            AggregatorState::Statistical(a) => a.flush(identity),
            AggregatorState::RawBucketed(a) => a.flush(identity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn identity(metric: &str) -> SeriesIdentity {
        SeriesIdentity {
            metric: metric.to_string(),
            tags: vec!["env:test".to_string()],
            host: Arc::from("testhost"),
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn aggregator(kind: MetricKind, metric: &str) -> Aggregator {
        Aggregator::new(kind, identity(metric), Arc::new(HistogramOptions::default()))
    }

    #[test]
    fn test_gauge_latest_wins() {
        let mut agg = aggregator(MetricKind::Gauge, "mem");
        agg.accumulate(1.5, at(100));
        agg.accumulate(7.25, at(101));

        let series = agg.flush();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].series_type, SeriesType::Gauge);
        assert_eq!(
            series[0].points,
            SeriesPoints::Scalar(vec![MetricPoint {
                timestamp: 101,
                value: 7.25
            }])
        );
        assert_eq!(series[0].tags, vec!["env:test"]);
        assert_eq!(series[0].host, "testhost");
    }

    #[test]
    fn test_gauge_overwrites_regardless_of_timestamp() {
        let mut agg = aggregator(MetricKind::Gauge, "mem");
        agg.accumulate(2.0, at(200));
        agg.accumulate(1.0, at(100));
        assert_eq!(agg.flush()[0].scalar_value(), Some(1.0));
    }

    #[test]
    fn test_counter_sums() {
        let mut agg = aggregator(MetricKind::Counter, "req");
        agg.accumulate(5.0, at(1));
        agg.accumulate(3.0, at(2));
        agg.accumulate(2.0, at(3));

        let series = agg.flush();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].series_type, SeriesType::Count);
        assert_eq!(series[0].scalar_value(), Some(10.0));
    }

    #[test]
    fn test_counter_truncates_fractions_before_summing() {
        let mut agg = aggregator(MetricKind::Counter, "req");
        agg.accumulate(0.9, at(1));
        agg.accumulate(0.9, at(1));
        agg.accumulate(2.7, at(1));
        agg.accumulate(-1.5, at(1));
        // 0 + 0 + 2 - 1
        assert_eq!(agg.flush()[0].scalar_value(), Some(1.0));
    }

    #[test]
    fn test_counter_tolerates_non_finite() {
        let mut agg = aggregator(MetricKind::Counter, "req");
        agg.accumulate(f64::NAN, at(1));
        agg.accumulate(f64::INFINITY, at(1));
        agg.accumulate(1.0, at(1));
        assert_eq!(agg.flush()[0].scalar_value(), Some(i64::MAX as f64));
    }

    #[test]
    fn test_histogram_selected_stats() {
        let options = HistogramOptions::new(
            vec![
                HistogramAggregate::Min,
                HistogramAggregate::Max,
                HistogramAggregate::Count,
            ],
            vec![],
        );
        let mut agg = Aggregator::new(MetricKind::Histogram, identity("lat"), Arc::new(options));
        agg.accumulate(1.0, at(10));
        agg.accumulate(5.0, at(11));
        agg.accumulate(3.0, at(12));

        let series = agg.flush();
        let summary: Vec<(&str, f64, SeriesType)> = series
            .iter()
            .map(|s| (s.metric.as_str(), s.scalar_value().unwrap(), s.series_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("lat.min", 1.0, SeriesType::Gauge),
                ("lat.max", 5.0, SeriesType::Gauge),
                ("lat.count", 3.0, SeriesType::Count),
            ]
        );
    }

    #[test]
    fn test_histogram_full_defaults() {
        let mut agg = aggregator(MetricKind::Histogram, "lat");
        for v in [4.0, 1.0, 3.0, 2.0] {
            agg.accumulate(v, at(5));
        }
        let series = agg.flush();
        let names: Vec<&str> = series.iter().map(|s| s.metric.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "lat.min",
                "lat.max",
                "lat.sum",
                "lat.count",
                "lat.avg",
                "lat.median",
                "lat.75percentile",
                "lat.85percentile",
                "lat.95percentile",
                "lat.99percentile",
            ]
        );
        assert_eq!(series[2].scalar_value(), Some(10.0));
        assert_eq!(series[4].scalar_value(), Some(2.5));
        // round(0.5 * 4) - 1 = 1
        assert_eq!(series[5].scalar_value(), Some(2.0));
        // round(0.75 * 4) - 1 = 2
        assert_eq!(series[6].scalar_value(), Some(3.0));
        // round(0.85 * 4) - 1 = 2
        assert_eq!(series[7].scalar_value(), Some(3.0));
        // round(0.95 * 4) - 1 = 3
        assert_eq!(series[8].scalar_value(), Some(4.0));
    }

    #[test]
    fn test_histogram_empty_flush_emits_nothing() {
        let mut agg = aggregator(MetricKind::Histogram, "lat");
        assert!(agg.flush().is_empty());

        agg.accumulate(1.0, at(1));
        assert_eq!(agg.flush().len(), 10);
        // Samples were consumed by the first flush
        assert!(agg.flush().is_empty());
    }

    #[test]
    fn test_distribution_groups_by_second() {
        let mut agg = aggregator(MetricKind::Distribution, "lat");
        let base = UNIX_EPOCH + Duration::from_secs(1_000);
        agg.accumulate(100.0, base + Duration::from_millis(10));
        agg.accumulate(250.0, base + Duration::from_millis(500));
        agg.accumulate(500.0, base + Duration::from_millis(999));

        let series = agg.flush();
        assert_eq!(series.len(), 1);
        assert!(series[0].is_distribution());
        match &series[0].points {
            SeriesPoints::Distribution(points) => {
                assert_eq!(points.len(), 1);
                assert_eq!(points[0].timestamp, 1_000);
                let mut values = points[0].values.clone();
                values.sort_by(f64::total_cmp);
                assert_eq!(values, vec![100.0, 250.0, 500.0]);
            }
            other => panic!("expected distribution points, got {:?}", other),
        }
    }

    #[test]
    fn test_distribution_buckets_ascending() {
        let mut agg = aggregator(MetricKind::Distribution, "lat");
        agg.accumulate(3.0, at(30));
        agg.accumulate(1.0, at(10));
        agg.accumulate(2.0, at(20));
        agg.accumulate(1.5, at(10));

        let series = agg.flush();
        match &series[0].points {
            SeriesPoints::Distribution(points) => {
                let stamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
                assert_eq!(stamps, vec![10, 20, 30]);
                assert_eq!(points[0].values, vec![1.0, 1.5]);
            }
            other => panic!("expected distribution points, got {:?}", other),
        }
    }
}
