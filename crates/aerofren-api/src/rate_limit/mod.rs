//! Fixed-window request rate limiting.
//!
//! Each identifier owns one [`RateLimitEntry`]. The first request in a
//! window creates it, later requests increment it, and the first request
//! after the window ends replaces it. Denied requests never mutate state.
//!
//! This is a fixed window, not a sliding window or token bucket: a client
//! can be admitted up to `2 * max_requests` times in a short span that
//! straddles a window boundary.
//!
//! State lives in a `DashMap`, so the check-and-increment for a single
//! identifier runs under that key's shard lock and cannot lose updates when
//! requests for the same identifier race on different threads.

mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Window and quota for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (> 0).
    pub window_ms: u64,
    /// Requests admitted per window (> 0).
    pub max_requests: u32,
}

/// Outcome of a single [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_reset_at: u64,
}

/// In-memory fixed-window rate limiter.
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter backed by the monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Count a request for `identifier` against `config`.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitDecision {
        let now = self.clock.now_millis();

        match self.entries.entry(identifier.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry::fresh(now, config));
                log_window_opened(identifier, config);
                RateLimitDecision::first_in_window(config)
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();

                if now >= entry.window_reset_at {
                    *entry = RateLimitEntry::fresh(now, config);
                    log_window_opened(identifier, config);
                    return RateLimitDecision::first_in_window(config);
                }

                let reset_in_ms = entry.window_reset_at - now;
                if entry.count < config.max_requests {
                    entry.count += 1;
                    RateLimitDecision {
                        allowed: true,
                        remaining: config.max_requests.saturating_sub(entry.count),
                        reset_in_ms,
                    }
                } else {
                    tracing::debug!(
                        target: "api.ratelimit",
                        identifier = %identifier,
                        max_requests = config.max_requests,
                        reset_in_ms = reset_in_ms,
                        "Rate limit exceeded"
                    );
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_in_ms,
                    }
                }
            }
        }
    }

    /// Remove entries whose window has ended. Returns the number removed.
    ///
    /// Removal is conditional on expiry under the key's lock, so an entry a
    /// concurrent `check` just renewed is kept.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.window_reset_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of tracked identifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn log_window_opened(identifier: &str, config: &RateLimitConfig) {
    tracing::debug!(
        target: "api.ratelimit",
        identifier = %identifier,
        window_ms = config.window_ms,
        max_requests = config.max_requests,
        "Rate limit window opened"
    );
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitEntry {
    fn fresh(now: u64, config: &RateLimitConfig) -> Self {
        Self {
            count: 1,
            window_reset_at: now.saturating_add(config.window_ms),
        }
    }
}

impl RateLimitDecision {
    fn first_in_window(config: &RateLimitConfig) -> Self {
        Self {
            allowed: true,
            remaining: config.max_requests.saturating_sub(1),
            reset_in_ms: config.window_ms,
        }
    }
}
