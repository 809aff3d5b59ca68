//! Metrics pipeline configuration
//!
//! Loaded from a TOML file, environment variables, or both (env wins).
//! Uses the standard Datadog environment variable names:
//!
//! - `DD_API_KEY`, then `DATADOG_API_KEY`: API key (required)
//! - `DD_SITE`, then `DATADOG_SITE`: intake site (default: `datadoghq.com`)
//! - `DD_HOSTNAME`: reported host (default: `HOSTNAME`, then `localhost`)
//! - `DD_TAGS`: default tags, comma or space separated
//!
//! Blank values are treated as absent.

pub mod sites;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::metrics::{BufferSettings, HistogramOptions};

/// Configuration for the buffer, the submission client and the reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// API key sent in the `DD-API-KEY` header
    pub api_key: Option<String>,
    /// Intake site, see [`sites`]
    pub site: String,
    /// Reported host; resolved at startup when unset
    pub host: Option<String>,
    /// Concatenated in front of every metric name
    pub prefix: Option<String>,
    /// Appended to every series at drain time
    pub default_tags: Vec<String>,
    /// Seconds between periodic flushes; 0 keeps only the shutdown flush
    pub flush_interval_secs: u64,
    /// Retries after the first attempt, per payload
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds
    pub retry_backoff_secs: f64,
    /// Per-request timeout in seconds
    pub http_timeout_secs: u64,
    /// Advisory ceiling on live aggregation keys
    pub max_buffer_size: usize,
    /// Statistics emitted by histograms recorded without explicit options
    pub histogram: HistogramOptions,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            api_key: None,
            site: sites::US.to_string(),
            host: None,
            prefix: None,
            default_tags: Vec::new(),
            flush_interval_secs: 15,
            max_retries: 2,
            retry_backoff_secs: 1.0,
            http_timeout_secs: 30,
            max_buffer_size: 10_000,
            histogram: HistogramOptions::default(),
        }
    }
}

impl MetricsConfig {
    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut config = MetricsConfig::default();
        config.apply_env();
        config
    }

    /// Overlay environment variables on this config
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`, which resolves an env variable name
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_blank("DD_API_KEY").or_else(|| non_blank("DATADOG_API_KEY")) {
            self.api_key = Some(key.trim().to_string());
        }
        if let Some(site) = non_blank("DD_SITE").or_else(|| non_blank("DATADOG_SITE")) {
            self.site = site.trim().to_string();
        }
        if let Some(host) = non_blank("DD_HOSTNAME") {
            self.host = Some(host.trim().to_string());
        }
        if let Some(tags) = non_blank("DD_TAGS") {
            self.default_tags = parse_tags(&tags);
        }
    }

    /// Check that the config can drive a submission client
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.api_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingApiKey),
        }
        if self.site.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "site",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.retry_backoff_secs.is_finite() || self.retry_backoff_secs < 0.0 {
            return Err(ConfigError::Invalid {
                field: "retry_backoff_secs",
                reason: format!("must be a non-negative number, got {}", self.retry_backoff_secs),
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "http_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(p) = self
            .histogram
            .percentiles
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0)
        {
            return Err(ConfigError::Invalid {
                field: "histogram.percentiles",
                reason: format!("{} is outside 0.0..=1.0", p),
            });
        }
        Ok(())
    }

    /// Configured host, else `HOSTNAME`, else `localhost`
    pub fn resolved_host(&self) -> String {
        self.host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| {
                std::env::var("HOSTNAME")
                    .ok()
                    .filter(|h| !h.trim().is_empty())
            })
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Backoff base; non-finite or negative values collapse to zero
    pub fn retry_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_backoff_secs).unwrap_or(Duration::ZERO)
    }

    /// Settings for an [`AggregationBuffer`](crate::metrics::AggregationBuffer)
    pub fn buffer_settings(&self) -> BufferSettings {
        BufferSettings {
            host: self.resolved_host(),
            prefix: self.prefix.clone().filter(|p| !p.is_empty()),
            default_tags: self.default_tags.clone(),
            max_buffer_size: self.max_buffer_size,
            histogram: self.histogram.clone(),
        }
    }
}

/// Split a `DD_TAGS` value on commas and whitespace
fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
