//! Retry policy for BGG requests
//!
//! Linear backoff scaled by the attempt number. Local rate-limit rejections
//! have their own budget: waiting for a token never uses up a network attempt.

use crate::error::FetchError;
use std::time::Duration;

/// Bounded retry policy used by the fetch pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first one
    pub max_attempts: u32,
    /// Backoff unit; the delay after attempt `n` is `base_delay * n`
    pub base_delay: Duration,
    /// Delay used for a rate-limit rejection that carries no hint
    pub rejection_fallback: Duration,
    /// Local rejections tolerated per request before giving up
    pub max_rejections: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            rejection_fallback: Duration::from_secs(2),
            max_rejections: 10,
        }
    }
}

/// What the pipeline should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// Decide whether attempt `attempt` (1-based) deserves a successor.
    pub fn decide(&self, err: &FetchError, attempt: u32) -> RetryDecision {
        if !err.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(err, attempt))
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, err: &FetchError, attempt: u32) -> Duration {
        match err {
            FetchError::RateLimited { retry_after } => self.rejection_delay(*retry_after),
            _ => self.backoff(attempt),
        }
    }

    /// Wait before asking the limiter again: its hint, else the fallback.
    pub fn rejection_delay(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.rejection_fallback)
    }

    /// Whether another local rejection may be waited out after `rejections`.
    pub fn may_wait_again(&self, rejections: u32) -> bool {
        rejections < self.max_rejections
    }

    /// Attempt-scaled backoff, strictly increasing for a non-zero base.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }
}
