//! Error types for the metrics pipeline
//!
//! Three layers, each with its own enum:
//! - `ConfigError`: fatal at startup, surfaced before any submission
//! - `TransportError`: what a single HTTP attempt can fail with
//! - `SubmitError`: the terminal outcome of one payload partition

use thiserror::Error;

/// Configuration could not be loaded or is unusable
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No API key in the config or in `DD_API_KEY` / `DATADOG_API_KEY`
    #[error("API key not found (set `api_key` or DD_API_KEY / DATADOG_API_KEY)")]
    MissingApiKey,

    /// A field holds a value the pipeline cannot work with
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Config file could not be read
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for `MetricsConfig`
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single HTTP attempt, before any status code was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded the configured HTTP timeout
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS, TLS or body I/O failure
    #[error("network error: {0}")]
    Network(String),

    /// Anything the transport could not classify (e.g. request build failure)
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the attempt may be repeated under the backoff policy
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Terminal failure of one partition submission
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    /// 4xx response, never retried
    #[error("client error {status}: {body}")]
    ClientError { status: u16, body: String },

    /// 5xx or other non-success status
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    /// Transport failure on one attempt
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<SubmitError>,
    },

    /// Payload could not be encoded as JSON, including a partition whose
    /// series held only non-finite values
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Shutdown was signalled while the partition was in flight
    #[error("submission cancelled")]
    Cancelled,
}

impl SubmitError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::ServerError { .. } => true,
            SubmitError::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SubmitError {
    fn from(e: serde_json::Error) -> Self {
        SubmitError::Serialization(e.to_string())
    }
}
