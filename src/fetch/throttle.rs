//! Coarse recency-window throttle for rate-limited hosts.
//!
//! The window is one FIFO of recently contacted hosts shared by the whole
//! run, not a per-host counter. A URL matching a rate-limited pattern waits a
//! fixed duration when its host is anywhere in the window.
//!
//! Known race: hosts are recorded when an item is dispatched, not when its
//! request is sent, so many workers can still hit the same host in a burst
//! before the wait kicks in. Conversely, an unrelated rate-limited URL can
//! wait just because its host appeared earlier. Both are accepted.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, instrument};

use crate::config::DomainPatterns;

/// Bounded FIFO of recently contacted hosts plus the wait policy.
#[derive(Debug)]
pub struct DomainThrottle {
    window: Mutex<VecDeque<String>>,
    capacity: usize,
    wait: Duration,
    rate_limited: DomainPatterns,
}

impl DomainThrottle {
    /// Creates a throttle. A `capacity` of 0 disables the window entirely.
    #[must_use]
    pub fn new(rate_limited: DomainPatterns, capacity: usize, wait: Duration) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            wait,
            rate_limited,
        }
    }

    /// Returns true if `url` is rate-limited and `host` is in the window.
    ///
    /// A missing host never waits; such items are rejected before this point.
    #[must_use]
    pub fn should_wait(&self, url: &str, host: Option<&str>) -> bool {
        let Some(host) = host else {
            return false;
        };
        if self.wait.is_zero() || !self.rate_limited.matches(url) {
            return false;
        }
        self.lock_window().iter().any(|recent| recent == host)
    }

    /// Appends `host`, evicting the oldest entries past capacity.
    pub fn record(&self, host: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut window = self.lock_window();
        window.push_back(host.to_string());
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// Decides, sleeps if needed, then records the host. Returns whether a
    /// wait happened.
    ///
    /// The sleep runs on the calling task and cannot be cancelled short of
    /// dropping the future.
    #[instrument(level = "trace", skip(self))]
    pub async fn admit(&self, url: &str, host: Option<&str>) -> bool {
        let Some(host) = host else {
            return false;
        };
        let waited = self.should_wait(url, Some(host));
        if waited {
            debug!(host, wait_ms = self.wait.as_millis(), "rate-limited host seen recently, waiting");
            tokio::time::sleep(self.wait).await;
        }
        self.record(host);
        waited
    }

    /// Copy of the current window, oldest first.
    #[must_use]
    pub fn window(&self) -> Vec<String> {
        self.lock_window().iter().cloned().collect()
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, VecDeque<String>> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
