//! reqwest-backed fetcher.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{FetchResponse, Fetcher};
use crate::error::{FetchError, FetchResult};

const DEFAULT_USER_AGENT: &str = concat!("prefix-scanner/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed before giving up on a probe
const MAX_REDIRECTS: usize = 5;

/// HTTP fetcher sharing one connection pool across all probes.
///
/// Only the status line is used; the body is dropped unread.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default user agent and redirect policy.
    pub fn new() -> FetchResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a fetcher that identifies itself as `user_agent`.
    pub fn with_user_agent(user_agent: &str) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;

        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchResponse> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status().as_u16();
        debug!(url = %url, status, "HTTP fetch finished");

        Ok(FetchResponse {
            status,
            effective_url: response.url().to_string(),
        })
    }
}
