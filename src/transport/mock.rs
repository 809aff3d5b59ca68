//! Scripted transport for tests
//!
//! Replays queued responses in order and records every request with the
//! tokio clock instant it was sent at, so backoff can be asserted under
//! `start_paused`. When nothing matching is queued it answers `202`.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::http::{HttpResponse, HttpTransport};
use crate::error::TransportError;

/// A request observed by [`ScriptedTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: Bytes,
    pub sent_at: Instant,
}

impl RecordedRequest {
    /// Body parsed as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

struct Scripted {
    /// Only answers requests whose URL contains this fragment
    url_fragment: Option<String>,
    response: Result<HttpResponse, TransportError>,
}

/// In-memory [`HttpTransport`] with scripted responses
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a status for the next request to any URL
    pub fn respond(&self, status: u16) -> &Self {
        self.push(None, Ok(HttpResponse::new(status)))
    }

    /// Queue a transport failure for the next request to any URL
    pub fn fail(&self, error: TransportError) -> &Self {
        self.push(None, Err(error))
    }

    /// Queue a status for the next request whose URL contains `fragment`
    pub fn respond_to(&self, fragment: &str, status: u16) -> &Self {
        self.push(Some(fragment.to_string()), Ok(HttpResponse::new(status)))
    }

    /// Queue a transport failure for the next request whose URL contains `fragment`
    pub fn fail_to(&self, fragment: &str, error: TransportError) -> &Self {
        self.push(Some(fragment.to_string()), Err(error))
    }

    /// Delay every response by `latency` on the tokio clock
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    fn push(&self, url_fragment: Option<String>, response: Result<HttpResponse, TransportError>) -> &Self {
        self.script.lock().push_back(Scripted {
            url_fragment,
            response,
        });
        self
    }

    fn next_response(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock();
        let matching = script.iter().position(|s| match &s.url_fragment {
            Some(fragment) => url.contains(fragment.as_str()),
            None => true,
        });
        match matching.and_then(|idx| script.remove(idx)) {
            Some(scripted) => scripted.response,
            None => Ok(HttpResponse::new(202)),
        }
    }

    /// Every request so far, in send order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests whose URL contains `fragment`
    pub fn requests_to(&self, fragment: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            self.requests.lock().push(RecordedRequest {
                url: url.to_string(),
                body,
                sent_at: Instant::now(),
            });
            let latency = *self.latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            self.next_response(url)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_default() {
        let transport = ScriptedTransport::new();
        transport.respond(500).fail(TransportError::Timeout);

        let url = "https://api.test/x";
        assert_eq!(transport.post_json(url, Bytes::new()).await.unwrap().status, 500);
        assert_eq!(transport.post_json(url, Bytes::new()).await, Err(TransportError::Timeout));
        assert_eq!(transport.post_json(url, Bytes::new()).await.unwrap().status, 202);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_fragment_matching() {
        let transport = ScriptedTransport::new();
        transport.respond_to("/distribution_points", 400);

        let series = transport.post_json("https://api.test/api/v2/series", Bytes::new()).await;
        assert_eq!(series.unwrap().status, 202);
        let dist = transport
            .post_json("https://api.test/api/v1/distribution_points", Bytes::new())
            .await;
        assert_eq!(dist.unwrap().status, 400);
        assert_eq!(transport.requests_to("series").len(), 1);
    }
}
