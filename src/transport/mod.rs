//! Delivery of drained series to the intake API
//!
//! - `payload`: the two JSON wire shapes
//! - `http`: the `HttpTransport` seam and its `reqwest` implementation
//! - `retry`: exponential backoff policy
//! - `client`: partitioning, endpoint routing and the retry loop
//! - `mock`: scripted transport for tests

mod client;
mod http;
pub mod mock;
pub mod payload;
mod retry;

pub use client::{SubmissionClient, DISTRIBUTION_PATH, SERIES_PATH};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport, API_KEY_HEADER, USER_AGENT};
pub use retry::RetryPolicy;
