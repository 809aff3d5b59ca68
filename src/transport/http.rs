//! HTTP transport abstraction
//!
//! The submission client only needs "POST this JSON, tell me the status".
//! Keeping that behind a trait lets tests script responses and observe
//! retry timing under a paused clock.
//!
//! Implementations:
//! - `ReqwestTransport`: production, rustls over HTTPS
//! - `ScriptedTransport` (in `mock`): scripted responses for tests

use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::error::{ConfigError, TransportError};

/// Header carrying the API key (`DD-API-KEY`; header names are lowercase on the wire)
pub const API_KEY_HEADER: &str = "dd-api-key";

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("datadog-metrics-rust/", env!("CARGO_PKG_VERSION"));

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        HttpResponse {
            status,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Sends one JSON POST per call
pub trait HttpTransport: Send + Sync + 'static {
    /// POST `body` as `application/json` to `url`
    ///
    /// Any received status is `Ok`; `Err` means no status was received.
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;
}

/// Production transport over `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that sends the API key and user agent on every request
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let mut api_key = HeaderValue::from_str(api_key.trim()).map_err(|e| ConfigError::Invalid {
            field: "api_key",
            reason: e.to_string(),
        })?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "http_timeout_secs",
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(ReqwestTransport { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            let response = self
                .client
                .post(url)
                .body(body)
                .send()
                .await
                .map_err(classify)?;

            let status = response.status().as_u16();
            // The body is only used for log context
            let body = response.text().await.unwrap_or_default();
            Ok(HttpResponse { status, body })
        }
        .boxed()
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_builder() {
        TransportError::Other(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        assert!(HttpResponse::new(202).is_success());
        assert!(!HttpResponse::new(302).is_success());
        assert!(HttpResponse::new(403).is_client_error());
        assert!(!HttpResponse::new(503).is_client_error());
    }

    #[test]
    fn test_rejects_unprintable_api_key() {
        let result = ReqwestTransport::new("bad\nkey", Duration::from_secs(1));
        assert!(matches!(result, Err(ConfigError::Invalid { field: "api_key", .. })));
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_retryable() {
        let transport = ReqwestTransport::new("key", Duration::from_secs(1)).unwrap();
        let err = transport
            .post_json("not a url", Bytes::from_static(b"{}"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
