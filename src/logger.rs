//! Application-facing metrics API
//!
//! `MetricsLogger` is a cheap-to-clone handle over a shared
//! [`AggregationBuffer`]. Every method records into the buffer and returns
//! immediately; nothing here touches the network.
//!
//! ```rust,ignore
//! let logger = MetricsLogger::new(buffer);
//! logger.increment("http.requests", &["route:/users"]);
//! logger.gauge("queue.depth", 42.0, &["queue:email"]);
//! logger.distribution("http.latency_ms", 12.5, &["route:/users"]);
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use crate::metrics::{AggregationBuffer, HistogramOptions, MetricKind, Series};

/// Records measurements into a shared buffer
#[derive(Debug, Clone)]
pub struct MetricsLogger {
    buffer: Arc<AggregationBuffer>,
}

impl MetricsLogger {
    pub fn new(buffer: Arc<AggregationBuffer>) -> Self {
        MetricsLogger { buffer }
    }

    pub fn buffer(&self) -> &Arc<AggregationBuffer> {
        &self.buffer
    }

    /// Ingestion entry point shared by every helper below
    ///
    /// `timestamp` defaults to now. Untagged measurements pass an empty
    /// slice; every empty tag type lands on the same key.
    pub fn record<S: AsRef<str>>(
        &self,
        kind: MetricKind,
        name: &str,
        value: f64,
        tags: &[S],
        timestamp: Option<SystemTime>,
    ) {
        let timestamp = timestamp.unwrap_or_else(SystemTime::now);
        self.buffer.record(kind, name, value, tags, timestamp, None);
    }

    pub fn gauge<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S]) {
        self.record(MetricKind::Gauge, name, value, tags, None);
    }

    pub fn gauge_at<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S], ts: SystemTime) {
        self.record(MetricKind::Gauge, name, value, tags, Some(ts));
    }

    /// Add `value` to a counter; fractional parts are dropped
    pub fn counter<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S]) {
        self.record(MetricKind::Counter, name, value, tags, None);
    }

    pub fn counter_at<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S], ts: SystemTime) {
        self.record(MetricKind::Counter, name, value, tags, Some(ts));
    }

    /// Add one to a counter
    pub fn increment<S: AsRef<str>>(&self, name: &str, tags: &[S]) {
        self.counter(name, 1.0, tags);
    }

    pub fn increment_at<S: AsRef<str>>(&self, name: &str, tags: &[S], ts: SystemTime) {
        self.counter_at(name, 1.0, tags, ts);
    }

    /// Histogram with the buffer's default statistics
    pub fn histogram<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S]) {
        self.record(MetricKind::Histogram, name, value, tags, None);
    }

    pub fn histogram_at<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S], ts: SystemTime) {
        self.record(MetricKind::Histogram, name, value, tags, Some(ts));
    }

    /// Histogram with its own statistics
    ///
    /// Options only take effect when this call creates the key; later
    /// calls fold into the existing aggregator unchanged.
    pub fn histogram_with<S: AsRef<str>>(
        &self,
        name: &str,
        value: f64,
        tags: &[S],
        options: &Arc<HistogramOptions>,
    ) {
        self.histogram_with_at(name, value, tags, options, SystemTime::now());
    }

    pub fn histogram_with_at<S: AsRef<str>>(
        &self,
        name: &str,
        value: f64,
        tags: &[S],
        options: &Arc<HistogramOptions>,
        ts: SystemTime,
    ) {
        self.buffer
            .record(MetricKind::Histogram, name, value, tags, ts, Some(options));
    }

    /// Raw value for server-side aggregation
    pub fn distribution<S: AsRef<str>>(&self, name: &str, value: f64, tags: &[S]) {
        self.record(MetricKind::Distribution, name, value, tags, None);
    }

    pub fn distribution_at<S: AsRef<str>>(
        &self,
        name: &str,
        value: f64,
        tags: &[S],
        ts: SystemTime,
    ) {
        self.record(MetricKind::Distribution, name, value, tags, Some(ts));
    }

    /// Drain the buffer by hand, bypassing the reporter
    pub fn flush(&self) -> Vec<Series> {
        self.buffer.drain()
    }
}
