//! Retry policy with bounded exponential backoff

use impulse_config::EmitterConfig;
use std::time::Duration;

/// Explicit retry state for one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base backoff in milliseconds
    base_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    max_backoff_ms: u64,

    /// Retries handed out so far
    current_attempt: u32,

    /// Retries allowed after the first attempt
    max_retries: u32,
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` deliveries in total
    ///
    /// # Arguments
    /// * `base_backoff_ms` - Delay before the first retry
    /// * `max_backoff_ms` - Cap on any single delay
    /// * `max_attempts` - Total attempts including the first (0 behaves like 1)
    pub fn new(base_backoff_ms: u64, max_backoff_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_backoff_ms,
            max_backoff_ms,
            current_attempt: 0,
            max_retries: max_attempts.saturating_sub(1),
        }
    }

    pub fn from_config(config: &EmitterConfig) -> Self {
        Self::new(
            config.base_backoff_ms,
            config.max_backoff_ms,
            config.max_attempts,
        )
    }

    /// Delay before the next retry, or `None` once the budget is spent
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        self.current_attempt += 1;

        // base * 2^(attempt - 1), capped
        let exp = 2u64.saturating_pow(self.current_attempt - 1);
        let backoff_ms = self
            .base_backoff_ms
            .saturating_mul(exp)
            .min(self.max_backoff_ms);

        Some(Duration::from_millis(backoff_ms))
    }

    /// Reset the policy (after a successful delivery)
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Retries handed out so far
    pub fn attempt_number(&self) -> u32 {
        self.current_attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_attempt >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut policy = RetryPolicy::new(100, 10_000, 6);

        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(100))); // 100 * 2^0
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(200))); // 100 * 2^1
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(400))); // 100 * 2^2
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(800))); // 100 * 2^3
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(1600))); // 100 * 2^4
        assert_eq!(policy.next_backoff(), None); // 6 attempts = 5 retries
    }

    #[test]
    fn test_backoff_capped() {
        let mut policy = RetryPolicy::new(10, 200, 20);

        for _ in 0..5 {
            policy.next_backoff();
        }
        // 10 * 2^5 = 320 is over the cap
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_reset() {
        let mut policy = RetryPolicy::new(100, 1_000, 5);

        policy.next_backoff();
        policy.next_backoff();
        assert_eq!(policy.attempt_number(), 2);

        policy.reset();
        assert_eq!(policy.attempt_number(), 0);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut policy = RetryPolicy::new(100, 1_000, 1);
        assert!(policy.is_exhausted());
        assert_eq!(policy.next_backoff(), None);

        let mut policy = RetryPolicy::new(100, 1_000, 0);
        assert_eq!(policy.next_backoff(), None);
    }

    #[test]
    fn test_large_attempt_counts_do_not_overflow() {
        let mut policy = RetryPolicy::new(u64::MAX / 2, u64::MAX, 100);
        for _ in 0..99 {
            assert!(policy.next_backoff().is_some());
        }
        assert!(policy.is_exhausted());
    }
}
