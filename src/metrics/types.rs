//! Core metric types for the aggregation pipeline

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of measurement being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value, latest wins
    /// Use for: memory usage, queue depth, temperature
    Gauge,

    /// Values summed over the flush interval
    /// Use for: request counts, errors, bytes sent
    Counter,

    /// Client-side statistics and percentiles
    /// Use for: latency when only a few fixed quantiles are needed
    Histogram,

    /// Raw values shipped for server-side aggregation
    /// Use for: latency that must be aggregated across hosts
    Distribution,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Distribution => "distribution",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type code carried by each entry on the series endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SeriesType {
    Gauge = 0,
    /// Defined by the intake API, never produced here
    Rate = 1,
    Count = 2,
}

impl SeriesType {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A single scalar point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    /// Unix seconds
    pub timestamp: i64,
    pub value: f64,
}

/// All raw values that fell into one whole second
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPoint {
    /// Unix seconds
    pub timestamp: i64,
    pub values: Vec<f64>,
}

/// Points of a series; the variant selects the wire format and endpoint
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesPoints {
    Scalar(Vec<MetricPoint>),
    Distribution(Vec<DistributionPoint>),
}

impl SeriesPoints {
    pub fn len(&self) -> usize {
        match self {
            SeriesPoints::Scalar(points) => points.len(),
            SeriesPoints::Distribution(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flush output of one aggregator
///
/// Immutable once drained: the submission client only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Prefixed metric name, plus a `.suffix` for histogram statistics
    pub metric: String,
    pub series_type: SeriesType,
    pub points: SeriesPoints,
    /// Record-time tags followed by the default tags
    pub tags: Vec<String>,
    /// Reporting host, sent as a `host` resource
    pub host: String,
}

impl Series {
    /// Whether this series goes to the distribution endpoint
    pub fn is_distribution(&self) -> bool {
        matches!(self.points, SeriesPoints::Distribution(_))
    }

    /// Value of the first scalar point, if any
    pub fn scalar_value(&self) -> Option<f64> {
        match &self.points {
            SeriesPoints::Scalar(points) => points.first().map(|p| p.value),
            SeriesPoints::Distribution(_) => None,
        }
    }
}

/// Convert a wall-clock instant to whole unix seconds, flooring
///
/// Instants before the epoch yield negative seconds rather than an error.
pub fn unix_seconds(ts: SystemTime) -> i64 {
    match ts.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => {
            let d = e.duration();
            let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
            if d.subsec_nanos() > 0 {
                -secs.saturating_add(1)
            } else {
                -secs
            }
        }
    }
}
