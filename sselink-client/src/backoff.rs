//! Reconnection backoff scheduling
//!
//! Computes the delay before each reconnection attempt:
//!
//! ```text
//! delay(attempt) = min(max_delay, delay × 2^attempt) + uniform(0..=1000ms)
//! ```
//!
//! The jitter term desynchronizes reconnection storms: when one upstream
//! outage fails many subscriptions at once, their retries land spread over
//! a second instead of hammering the gateway in lockstep.
//!
//! Delays are only handed out while the attempt count sits below the
//! per-kind ceiling. `Timeout` failures use a distinct, smaller ceiling
//! than network/server failures: repeated silent timeouts usually mean a
//! structurally broken upstream, not a transient blip. A successful
//! reconnection resets the attempt count to zero.
//!
//! # Examples
//!
//! ```rust
//! use sselink_client::{ErrorKind, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default()
//!     .with_attempts(3)
//!     .with_delay(Duration::from_millis(100));
//!
//! assert!(policy.next_delay(ErrorKind::Network, 0).is_some());
//! assert!(policy.next_delay(ErrorKind::Network, 3).is_none());
//! ```

use crate::classify::ErrorKind;
use std::time::Duration;

/// Upper bound of the uniform jitter added to every delay, in milliseconds.
pub const JITTER_MS: u64 = 1000;

/// Retry policy for a link's subscriptions.
///
/// One policy is shared by every connection a link creates; the per-kind
/// attempt counters live on the connections themselves.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling for `Network`, `Server`, and `Parse` failures
    pub attempts: u32,
    /// Stricter attempt ceiling for `Timeout` failures
    pub timeout_attempts: u32,
    /// Base delay before the first reconnection attempt
    pub delay: Duration,
    /// Cap on the exponential term (jitter is added on top)
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            timeout_attempts: 2,
            delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Set the attempt ceiling for network/server/parse failures.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the stricter attempt ceiling for timeout failures.
    pub fn with_timeout_attempts(mut self, attempts: u32) -> Self {
        self.timeout_attempts = attempts;
        self
    }

    /// Set the base delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the delay cap.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// The attempt ceiling that applies to failures of `kind`.
    pub fn max_attempts_for(&self, kind: ErrorKind) -> u32 {
        match kind {
            ErrorKind::Timeout => self.timeout_attempts,
            _ => self.attempts,
        }
    }

    /// The deterministic part of the delay: `min(max_delay, delay × 2^n)`.
    ///
    /// Saturates instead of overflowing for large attempt counts.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp_ms = base_ms.saturating_mul(factor);
        Duration::from_millis(exp_ms.min(self.max_delay.as_millis() as u64))
    }

    /// The delay before reconnection attempt number `attempt` (0-indexed),
    /// or `None` when the failure should not be retried: the kind is
    /// non-retryable, or its attempt ceiling is reached.
    pub fn next_delay(&self, kind: ErrorKind, attempt: u32) -> Option<Duration> {
        if !kind.is_retryable() || attempt >= self.max_attempts_for(kind) {
            return None;
        }

        use rand::Rng;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MS));
        Some(self.base_delay(attempt) + jitter)
    }
}
