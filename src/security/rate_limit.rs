//! Per-client sliding-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default trailing window length.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Admission history for one client inside the trailing window.
///
/// Invariant: after `allow_at`, the vector holds no instant older than
/// `now - window`. Pruning happens lazily on each check; there is no
/// background sweep.
#[derive(Debug, Default)]
struct SlidingWindow {
    requests: Vec<Instant>,
}

impl SlidingWindow {
    /// Admission check at an explicit instant.
    ///
    /// Drops expired entries, then admits and records `now` only while the
    /// remaining count is below the threshold. Denials are not recorded.
    fn allow_at(&mut self, now: Instant, window: Duration, max_requests: usize) -> bool {
        if let Some(cutoff) = now.checked_sub(window) {
            self.requests.retain(|t| *t > cutoff);
        }

        if self.requests.len() >= max_requests {
            return false;
        }

        self.requests.push(now);
        true
    }
}

/// Sliding-window rate limiter keyed by client identifier.
///
/// One coarse lock guards all windows; per-key locking is not needed at
/// expected client cardinality.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, SlidingWindow>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    /// Limiter with the default one-minute window.
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self::with_window(DEFAULT_WINDOW, max_requests_per_minute as usize)
    }

    pub fn with_window(window: Duration, max_requests: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    /// Admission check for `client_id` at the current instant.
    pub fn allow(&self, client_id: &str) -> bool {
        self.allow_at(client_id, Instant::now())
    }

    /// Admission check at an explicit instant. Test seam; `allow` is the
    /// production entry point.
    pub(crate) fn allow_at(&self, client_id: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        windows
            .entry(client_id.to_string())
            .or_default()
            .allow_at(now, self.window, self.max_requests)
    }

    /// Number of clients with tracked admission history.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().expect("rate limiter mutex poisoned").len()
    }
}
