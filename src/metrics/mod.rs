//! Client-side metrics aggregation
//!
//! Measurements are folded into per-key aggregators until the reporter
//! drains them:
//!
//! - **Gauge** keeps the latest value
//! - **Counter** sums truncated integer increments
//! - **Histogram** computes statistics and percentiles locally
//! - **Distribution** ships raw values bucketed by second
//!
//! The key is the prefixed metric name plus the ordinal-sorted tag set, so
//! tag order never splits a series.

mod aggregator;
mod buffer;
mod histogram;
mod key_encoder;
mod types;

pub use aggregator::{
    Accumulate, Aggregator, LatestAggregator, RawBucketedAggregator, SeriesIdentity,
    StatisticalAggregator, SumAggregator,
};
pub use buffer::{AggregationBuffer, BufferSettings};
pub use histogram::{percentile, percentile_label, HistogramAggregate, HistogramOptions};
pub use key_encoder::{AggregationKey, MetricKeyEncoder, NAME_SEPARATOR, TAG_SEPARATOR};
pub use types::{
    unix_seconds, DistributionPoint, MetricKind, MetricPoint, Series, SeriesPoints, SeriesType,
};
