//! Client-side rate limiter for BGG API requests
//!
//! Token bucket of capacity one, refilled by a single token every fixed
//! interval (GCRA via the governor crate). There is no queue: a request that
//! cannot be admitted right now is rejected with a hint of how long to wait.

use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default interval between admitted requests
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Admission was denied because the bucket is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limit exceeded, retry after {retry_after:?}")]
pub struct RateLimitRejection {
    /// Time until the next token becomes available, when known
    pub retry_after: Option<Duration>,
}

/// Process-wide admission gate for outbound BGG requests
///
/// Share one instance (behind an `Arc`) between every caller that talks to
/// the same service; the underlying state is atomic, so concurrent callers
/// may consult it without further locking.
pub struct RateLimiter {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
    interval: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting one request per `interval`
    ///
    /// A zero interval is clamped to one millisecond.
    pub fn new(interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(std::num::NonZeroU32::MIN));
        let clock = DefaultClock::default();

        Self {
            limiter: GovernorRateLimiter::direct_with_clock(quota, &clock),
            clock,
            interval,
        }
    }

    /// Ask for permission to send one request now
    pub fn acquire(&self) -> Result<(), RateLimitRejection> {
        match self.limiter.check() {
            Ok(()) => {
                debug!("Rate limit permission granted");
                Ok(())
            }
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(RateLimitRejection {
                    retry_after: Some(wait),
                })
            }
        }
    }

    /// Configured refill interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
