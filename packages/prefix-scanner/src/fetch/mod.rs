//! The remote fetch collaborator.
//!
//! The engine only needs a status code and the URL the request ended up at;
//! transport details (TLS, pooling, redirects) stay behind [`Fetcher`].

mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchResult;

pub use http::HttpFetcher;

/// What a completed request reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    /// Final URL after redirects
    pub effective_url: String,
}

impl FetchResponse {
    pub fn new(status: u16, effective_url: impl Into<String>) -> Self {
        Self {
            status,
            effective_url: effective_url.into(),
        }
    }
}

/// Issues one request per probe.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchResponse>;
}
