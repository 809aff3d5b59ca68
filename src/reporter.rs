//! Periodic reporter
//!
//! Background task that drains the buffer and submits the result on a fixed
//! interval. Flushes never overlap: the loop awaits each submission before
//! waiting for the next tick.
//!
//! ## Lifecycle
//!
//! 1. Wait one full interval (no flush at startup)
//! 2. On every tick: drain, then submit
//! 3. On cancellation: one final flush with a fresh token, then return
//!
//! A zero interval disables step 2; only the final flush runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::AggregationBuffer;
use crate::transport::SubmissionClient;

/// Result of one drain-and-submit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no request was made
    Empty,
    /// Every partition was accepted
    Submitted { series: usize },
    /// At least one partition failed; its series are dropped
    Failed { series: usize },
}

/// Drains a buffer into a submission client on a timer
pub struct Reporter {
    buffer: Arc<AggregationBuffer>,
    client: SubmissionClient,
    flush_interval: Duration,
}

impl Reporter {
    pub fn new(
        buffer: Arc<AggregationBuffer>,
        client: SubmissionClient,
        flush_interval: Duration,
    ) -> Self {
        Reporter {
            buffer,
            client,
            flush_interval,
        }
    }

    pub fn buffer(&self) -> &Arc<AggregationBuffer> {
        &self.buffer
    }

    /// Drain the buffer and submit whatever it held
    pub async fn flush_once(&self, cancel: &CancellationToken) -> FlushOutcome {
        let series = self.buffer.drain();
        if series.is_empty() {
            debug!("no metrics to flush");
            return FlushOutcome::Empty;
        }

        let count = series.len();
        if self.client.submit(&series, cancel).await {
            debug!(series = count, "flushed metrics");
            FlushOutcome::Submitted { series: count }
        } else {
            warn!(series = count, "metrics flush failed, dropping drained series");
            FlushOutcome::Failed { series: count }
        }
    }

    /// Flush periodically until `cancel` fires, then flush one last time
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            flush_interval_ms = self.flush_interval.as_millis() as u64,
            "metrics reporter started"
        );

        if self.flush_interval.is_zero() {
            cancel.cancelled().await;
        } else {
            let mut tick = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        self.flush_once(&cancel).await;
                    }
                }
            }
        }

        info!("metrics reporter stopping, flushing remaining metrics");
        // Shutdown already fired on `cancel`; the last flush must not see it
        let outcome = self.flush_once(&CancellationToken::new()).await;
        info!(?outcome, "metrics reporter stopped");
    }

    /// Run on the current tokio runtime
    pub fn spawn(self) -> ReporterHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        ReporterHandle { cancel, task }
    }
}

/// Handle to a spawned [`Reporter`]
pub struct ReporterHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Token that stops the reporter when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the reporter and wait for its final flush
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "metrics reporter task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKind;
    use crate::transport::mock::ScriptedTransport;
    use crate::transport::RetryPolicy;
    use std::time::SystemTime;

    const NO_TAGS: &[&str] = &[];

    fn setup(
        interval: Duration,
    ) -> (Arc<AggregationBuffer>, Arc<ScriptedTransport>, Reporter) {
        let buffer = Arc::new(AggregationBuffer::default());
        let transport = Arc::new(ScriptedTransport::new());
        let client = SubmissionClient::new(
            transport.clone(),
            "datadoghq.com",
            RetryPolicy::new(0, Duration::from_secs(1)),
        );
        let reporter = Reporter::new(buffer.clone(), client, interval);
        (buffer, transport, reporter)
    }

    #[tokio::test]
    async fn test_flush_once_outcomes() {
        let (buffer, transport, reporter) = setup(Duration::from_secs(15));
        let cancel = CancellationToken::new();

        assert_eq!(reporter.flush_once(&cancel).await, FlushOutcome::Empty);
        assert_eq!(transport.request_count(), 0);

        buffer.record(MetricKind::Gauge, "g", 1.0, NO_TAGS, SystemTime::now(), None);
        assert_eq!(
            reporter.flush_once(&cancel).await,
            FlushOutcome::Submitted { series: 1 }
        );

        transport.respond(400);
        buffer.record(MetricKind::Gauge, "g", 1.0, NO_TAGS, SystemTime::now(), None);
        assert_eq!(
            reporter.flush_once(&cancel).await,
            FlushOutcome::Failed { series: 1 }
        );
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_one_interval() {
        let (buffer, transport, reporter) = setup(Duration::from_secs(10));
        buffer.record(MetricKind::Counter, "c", 1.0, NO_TAGS, SystemTime::now(), None);

        let handle = reporter.spawn();
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(transport.request_count(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.request_count(), 1);

        handle.shutdown().await;
        // Final flush found nothing new
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_remaining() {
        let (buffer, transport, reporter) = setup(Duration::from_secs(60));
        let handle = reporter.spawn();

        buffer.record(MetricKind::Gauge, "g", 3.0, NO_TAGS, SystemTime::now(), None);
        handle.shutdown().await;

        assert_eq!(transport.request_count(), 1);
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_only_flushes_on_shutdown() {
        let (buffer, transport, reporter) = setup(Duration::ZERO);
        let handle = reporter.spawn();

        buffer.record(MetricKind::Gauge, "g", 3.0, NO_TAGS, SystemTime::now(), None);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(transport.request_count(), 0);

        handle.shutdown().await;
        assert_eq!(transport.request_count(), 1);
    }
}
