//! HTTP client wrapper.
//!
//! Automatic redirect following is disabled: the resolver walks redirect
//! chains itself so it can check every hop against the forbidden list before
//! the request is made.

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use super::error::FetchError;
use crate::config::FetchConfig;

/// Shared HTTP client; cheap to clone, one connection pool per run.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client with explicit timeouts and User-Agent.
    ///
    /// `read_timeout` applies to each read, not to the whole body, so large
    /// artifacts on slow-but-alive servers still complete.
    ///
    /// # Errors
    ///
    /// Returns the builder error if TLS initialisation fails or the
    /// User-Agent is not a valid header value.
    #[instrument(level = "debug", skip(user_agent))]
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .gzip(true)
            .user_agent(user_agent)
            .build()?;
        debug!("HTTP client ready");
        Ok(Self { client })
    }

    /// Builds a client from the run configuration.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::new`].
    pub fn from_config(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.connect_timeout, config.read_timeout, &config.user_agent)
    }

    /// Issues a single GET without following redirects.
    ///
    /// Any status is returned as `Ok`; interpreting it is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] or [`FetchError::Network`].
    pub async fn get(&self, url: &Url) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_request(url.as_str(), e))
    }
}
