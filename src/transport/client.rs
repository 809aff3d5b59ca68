//! Submission client
//!
//! Splits drained series by wire format and posts each partition to its
//! endpoint, retrying transient failures with exponential backoff.
//!
//! ## Retry decisions, per attempt
//!
//! | Outcome            | Action                         |
//! |--------------------|--------------------------------|
//! | 2xx                | success                        |
//! | 4xx                | fail, no retry                 |
//! | other status       | retry after `base * 2^attempt` |
//! | network failure    | retry after `base * 2^attempt` |
//! | timeout            | fail, no retry                 |
//! | unclassified error | fail, no retry                 |
//!
//! Both the request and the backoff sleep race the cancellation token, so
//! shutdown never waits out a backoff.

use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::http::{HttpTransport, ReqwestTransport};
use super::payload;
use super::retry::RetryPolicy;
use crate::config::{sites, MetricsConfig};
use crate::error::{ConfigError, SubmitError, TransportError};
use crate::metrics::Series;

/// Path of the series endpoint
pub const SERIES_PATH: &str = "/api/v2/series";

/// Path of the distribution endpoint
pub const DISTRIBUTION_PATH: &str = "/api/v1/distribution_points";

/// Posts drained series to the intake API
#[derive(Clone)]
pub struct SubmissionClient {
    transport: Arc<dyn HttpTransport>,
    series_url: String,
    distribution_url: String,
    retry: RetryPolicy,
}

impl SubmissionClient {
    pub fn new(transport: Arc<dyn HttpTransport>, site: &str, retry: RetryPolicy) -> Self {
        let base = sites::api_base(site);
        SubmissionClient {
            transport,
            series_url: format!("{}{}", base, SERIES_PATH),
            distribution_url: format!("{}{}", base, DISTRIBUTION_PATH),
            retry,
        }
    }

    /// Build a client over HTTPS from a validated config
    pub fn from_config(config: &MetricsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let api_key = config.api_key.as_deref().ok_or(ConfigError::MissingApiKey)?;
        let transport = ReqwestTransport::new(api_key, config.http_timeout())?;
        Ok(SubmissionClient::new(
            Arc::new(transport),
            &config.site,
            RetryPolicy::from_config(config),
        ))
    }

    pub fn series_url(&self) -> &str {
        &self.series_url
    }

    pub fn distribution_url(&self) -> &str {
        &self.distribution_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Submit every series; `true` only when every non-empty partition succeeded
    ///
    /// An empty list succeeds without any request. Failures are logged here.
    pub async fn submit(&self, series: &[Series], cancel: &CancellationToken) -> bool {
        if series.is_empty() {
            return true;
        }

        let (distributions, scalars): (Vec<&Series>, Vec<&Series>) =
            series.iter().partition(|s| s.is_distribution());

        let (scalar_result, distribution_result) = tokio::join!(
            self.send_series(&scalars, cancel),
            self.send_distributions(&distributions, cancel),
        );

        let mut ok = true;
        if let Err(e) = scalar_result {
            error!(series = scalars.len(), error = %e, "failed to submit series payload");
            ok = false;
        }
        if let Err(e) = distribution_result {
            error!(series = distributions.len(), error = %e, "failed to submit distribution payload");
            ok = false;
        }
        ok
    }

    /// Post scalar series to the series endpoint; empty input is a no-op
    pub async fn send_series(
        &self,
        series: &[&Series],
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        if series.is_empty() {
            return Ok(());
        }
        let body = payload::encode_series(series)?;
        self.send_with_retry(&self.series_url, body, cancel).await
    }

    /// Post distribution series to the distribution endpoint; empty input is a no-op
    pub async fn send_distributions(
        &self,
        series: &[&Series],
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        if series.is_empty() {
            return Ok(());
        }
        let body = payload::encode_distributions(series)?;
        self.send_with_retry(&self.distribution_url, body, cancel).await
    }

    async fn send_with_retry(
        &self,
        url: &str,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        let mut attempt: u32 = 0;
        loop {
            debug!(url = %url, attempt, bytes = body.len(), "submitting metrics payload");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SubmitError::Cancelled),
                result = self.transport.post_json(url, body.clone()) => result,
            };

            let failure = match result {
                Ok(response) if response.is_success() => {
                    debug!(url = %url, attempt, status = response.status, "metrics payload accepted");
                    return Ok(());
                }
                Ok(response) if response.is_client_error() => {
                    error!(
                        url = %url,
                        status = response.status,
                        body = %response.body,
                        "metrics payload rejected, not retrying"
                    );
                    return Err(SubmitError::ClientError {
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(response) => SubmitError::ServerError {
                    status: response.status,
                    body: response.body,
                },
                Err(TransportError::Timeout) => {
                    warn!(url = %url, attempt, "metrics submission timed out, not retrying");
                    return Err(TransportError::Timeout.into());
                }
                Err(e) if !e.is_retryable() => {
                    error!(url = %url, attempt, error = %e, "metrics submission failed");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "network error submitting metrics");
                    e.into()
                }
            };

            if attempt >= self.retry.max_retries {
                let attempts = attempt.saturating_add(1);
                error!(url = %url, attempts, error = %failure, "metrics submission retries exhausted");
                return Err(SubmitError::RetriesExhausted {
                    attempts,
                    last: Box::new(failure),
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            info!(
                url = %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying metrics submission"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SubmitError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl std::fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionClient")
            .field("series_url", &self.series_url)
            .field("distribution_url", &self.distribution_url)
            .field("retry", &self.retry)
            .finish()
    }
}
