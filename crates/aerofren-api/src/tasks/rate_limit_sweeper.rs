//! Rate-limit sweeper background task.
//!
//! Expired entries are harmless to correctness (the next `check` replaces
//! them) but would otherwise accumulate one per client ever seen.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the token
//! is cancelled, the task completes its current iteration and exits cleanly.

use crate::observability::metrics::set_rate_limit_entries;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Run the sweeper loop until `cancel_token` is cancelled.
///
/// The first sweep happens one `interval` after start.
pub async fn start_rate_limit_sweeper(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "api.task.ratelimit_sweep",
        interval_secs = interval.as_secs(),
        "Starting rate limit sweeper task"
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.sweep();
                let remaining = limiter.len();
                set_rate_limit_entries(remaining);

                if removed > 0 {
                    debug!(
                        target: "api.task.ratelimit_sweep",
                        removed,
                        remaining,
                        "Swept expired rate limit entries"
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "api.task.ratelimit_sweep",
                    "Rate limit sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}
