//! Retry policy and backoff computation.
//!
//! The loader retries the full load sequence on any failure, sleeping
//! between attempts with exponential backoff plus random jitter, capped at
//! the policy's maximum delay. Pure configuration - no mutable state.

use rand::Rng;
use std::time::Duration;

/// Default number of load attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the first backoff.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default cap on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Upper bound on the random jitter added to each backoff.
pub const MAX_JITTER_MS: u64 = 1000;

/// Retry configuration for a load call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after that.
    pub base_delay: Duration,
    /// Cap applied to the computed delay, jitter included.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with explicit values.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Deterministic part of the backoff for a 1-based attempt number:
    /// `min(base_delay * 2^(attempt - 1), max_delay)`.
    ///
    /// Non-decreasing in `attempt` and never exceeds `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        // 2^31 already overflows any sane delay; clamp the shift instead
        // of letting the multiplier wrap.
        let factor = if exponent >= 31 {
            u32::MAX
        } else {
            1u32 << exponent
        };
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff with random jitter applied, capped at `max_delay`:
    /// `min(base_delay * 2^(attempt - 1) + jitter(<= 1000ms), max_delay)`.
    pub fn backoff_delay_jittered(&self, attempt: u32) -> Duration {
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER_MS));
        self.backoff_delay(attempt)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}
