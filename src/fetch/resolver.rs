//! Explicit redirect-chain resolution.
//!
//! The resolver issues one request per hop with automatic redirects disabled.
//! Each hop is checked against the forbidden patterns *before* it is requested,
//! so a `Location` pointing at a blocked publisher never produces traffic to
//! it. A 200 response is handed back still open, letting the caller stream the
//! body without a second round trip.

use std::sync::Arc;

use reqwest::header::LOCATION;
use tracing::{debug, trace, warn};
use url::Url;

use super::client::HttpClient;
use super::error::FetchError;
use crate::config::DomainPatterns;

/// Statuses treated as redirects.
pub const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 304, 307, 308];

/// A chain that ended in 200.
#[derive(Debug)]
pub struct Resolved {
    /// URL of the final hop.
    pub final_url: Url,
    /// Number of redirects followed.
    pub hops: u32,
    /// The open 200 response.
    pub response: reqwest::Response,
}

impl Resolved {
    /// Declared `Content-Type`, if present and valid UTF-8.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Follows redirects up to a hop bound, refusing forbidden targets.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: HttpClient,
    forbidden: Arc<DomainPatterns>,
    max_hops: u32,
    watch_statuses: Arc<[u16]>,
}

impl RedirectResolver {
    #[must_use]
    pub fn new(
        client: HttpClient,
        forbidden: Arc<DomainPatterns>,
        max_hops: u32,
        watch_statuses: impl Into<Arc<[u16]>>,
    ) -> Self {
        Self {
            client,
            forbidden,
            max_hops,
            watch_statuses: watch_statuses.into(),
        }
    }

    /// Resolves `start` to an open 200 response.
    ///
    /// # Errors
    ///
    /// - [`FetchError::PolicyBlocked`] if any hop matches a forbidden pattern
    /// - [`FetchError::MissingLocation`] for a redirect without a usable target
    /// - [`FetchError::RedirectExhausted`] once more than `max_hops` redirects
    ///   would be needed
    /// - [`FetchError::HttpStatus`] for any other non-200 status
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] from the client
    pub async fn resolve(&self, start: Url) -> Result<Resolved, FetchError> {
        let origin = start.to_string();
        let mut current = start;
        let mut hops: u32 = 0;

        loop {
            if let Some(pattern) = self.forbidden.first_match(current.as_str()) {
                trace!(url = %current, pattern, hops, "hop blocked by forbidden pattern");
                return Err(FetchError::policy_blocked(current.as_str(), pattern));
            }

            let response = self.client.get(&current).await?;
            let status = response.status().as_u16();

            if status == 200 {
                debug!(url = %current, hops, "resolved");
                return Ok(Resolved {
                    final_url: current,
                    hops,
                    response,
                });
            }

            if !REDIRECT_STATUSES.contains(&status) {
                if self.watch_statuses.contains(&status) {
                    warn!(url = %current, status, hops, "watched status; host may be blocking us");
                } else {
                    debug!(url = %current, status, hops, "non-success status");
                }
                return Err(FetchError::http_status(current.as_str(), status));
            }

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|loc| !loc.is_empty())
                .map(str::to_string);
            drop(response);

            let Some(location) = location else {
                debug!(url = %current, status, "redirect without Location");
                return Err(FetchError::missing_location(current.as_str(), status));
            };

            if hops >= self.max_hops {
                debug!(url = %origin, hops, "redirect bound reached");
                return Err(FetchError::redirect_exhausted(origin, hops));
            }

            if let Some(pattern) = self.forbidden.first_match(&location) {
                trace!(location = %location, pattern, "redirect target blocked");
                return Err(FetchError::policy_blocked(location, pattern));
            }

            let Some(next) = absolutize_location(&current, &location) else {
                debug!(url = %current, location = %location, "unusable Location");
                return Err(FetchError::missing_location(current.as_str(), status));
            };

            trace!(from = %current, to = %next, status, "following redirect");
            hops += 1;
            current = next;
        }
    }
}

/// Turns a `Location` value into an absolute URL.
///
/// Absolute targets are used as-is. `//host/path` inherits the scheme.
/// `/path` is rebuilt on the current scheme, host, and explicit port (default
/// ports are omitted). Other relative forms are joined onto the current URL.
#[must_use]
pub fn absolutize_location(current: &Url, location: &str) -> Option<Url> {
    if let Ok(absolute) = Url::parse(location) {
        return Some(absolute);
    }
    if location.starts_with("//") {
        return Url::parse(&format!("{}:{location}", current.scheme())).ok();
    }
    if location.starts_with('/') {
        let host = current.host_str()?;
        let origin = match current.port() {
            Some(port) => format!("{}://{host}:{port}", current.scheme()),
            None => format!("{}://{host}", current.scheme()),
        };
        return Url::parse(&format!("{origin}{location}")).ok();
    }
    current.join(location).ok()
}
