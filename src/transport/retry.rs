//! Exponential backoff policy

use std::time::Duration;

use crate::config::MetricsConfig;

/// How many times to retry a payload, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every retry after that
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        RetryPolicy {
            max_retries,
            backoff_base,
        }
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        RetryPolicy::new(config.max_retries, config.retry_backoff())
    }

    /// Total attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after failed attempt `attempt` (0-based): `base * 2^attempt`
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2f64.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::try_from_secs_f64(self.backoff_base.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(5_000), Duration::MAX);
    }

    #[test]
    fn test_zero_base_never_sleeps() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(10), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(5_000), Duration::ZERO);
    }

    #[test]
    fn test_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts(), 3);
        assert_eq!(RetryPolicy::new(u32::MAX, Duration::ZERO).max_attempts(), u32::MAX);
    }
}
