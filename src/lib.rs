//! Client-side Datadog metrics pipeline
//!
//! Application code records gauges, counters, histograms and distributions
//! through a [`MetricsLogger`]. Measurements aggregate in memory per
//! (metric name, tag set) and a [`Reporter`] periodically submits them to
//! the intake API, retrying transient failures with exponential backoff.
//!
//! ```text
//! MetricsLogger ──record──► AggregationBuffer ──drain──► Reporter
//!                                                           │
//!                                  /api/v2/series  ◄────────┤ SubmissionClient
//!                      /api/v1/distribution_points ◄────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod observability;
pub mod reporter;
pub mod transport;

pub use bridge::{InstrumentBridge, InstrumentKind};
pub use config::MetricsConfig;
pub use error::{ConfigError, SubmitError, TransportError};
pub use logger::MetricsLogger;
pub use metrics::{AggregationBuffer, HistogramAggregate, HistogramOptions, MetricKind, Series};
pub use reporter::{FlushOutcome, Reporter, ReporterHandle};
pub use transport::{HttpTransport, RetryPolicy, SubmissionClient};

use std::sync::Arc;

/// A wired pipeline: logger, shared buffer and a running reporter
pub struct MetricsPipeline {
    pub logger: MetricsLogger,
    pub reporter: ReporterHandle,
}

impl MetricsPipeline {
    /// Validate `config`, then build and spawn the pipeline on the current runtime
    pub fn start(config: &MetricsConfig) -> Result<Self, ConfigError> {
        let client = SubmissionClient::from_config(config)?;
        Ok(Self::start_with_client(config, client))
    }

    /// Same as [`start`](Self::start) with a caller-supplied client
    pub fn start_with_client(config: &MetricsConfig, client: SubmissionClient) -> Self {
        let buffer = Arc::new(AggregationBuffer::new(config.buffer_settings()));
        let logger = MetricsLogger::new(buffer.clone());
        let reporter = Reporter::new(buffer, client, config.flush_interval()).spawn();
        MetricsPipeline { logger, reporter }
    }

    /// Stop the reporter after its final flush
    pub async fn shutdown(self) {
        self.reporter.shutdown().await;
    }
}
