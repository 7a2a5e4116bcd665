//! Retry policy shared by every remote operation.

use std::time::Duration;

/// Bounded exponential backoff.
///
/// Attempt `n` (1-based) that fails waits `delay_after(n)` before attempt
/// `n + 1`. No attempt beyond `max_attempts` is ever made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff to wait after the given failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = self.multiplier.max(1.0).powi(exponent as i32);
        let delay_ms = (self.initial_delay.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    #[must_use]
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_spacing_stays_between_ten_and_thirty_seconds() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..policy.max_attempts)
            .map(|attempt| policy.delay_after(attempt).as_secs())
            .collect();

        assert_eq!(delays, vec![10, 20, 30, 30]);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry_after(4));
        assert!(!policy.allows_retry_after(5));
        assert!(!RetryPolicy::once().allows_retry_after(1));
    }
}
