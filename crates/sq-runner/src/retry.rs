//! Retry policy for transient query failures.

use serde::Deserialize;
use std::time::Duration;

/// How often, and after what pause, a failed attempt is re-run. The first
/// retry waits `backoff_ms`; every later one multiplies the pause by
/// `backoff_multiplier`, never exceeding `max_backoff_ms`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RetryPolicy {
    /// Re-attempts after the first try.
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: 1000,
            backoff_multiplier: 1.0,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Whether the `retry`-th re-attempt (0-based) is still within budget.
    pub fn allows_retry(&self, retry: u32) -> bool {
        retry < self.max_retries
    }

    /// Pause before the `retry`-th re-attempt (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scale = self.backoff_multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let ms = (self.backoff_ms as f64 * scale).clamp(0.0, self.max_backoff_ms as f64);
        Duration::from_millis(ms as u64)
    }
}
