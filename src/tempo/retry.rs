use crate::config::RetryConfig;
use crate::error::TempoError;
use std::time::Duration;

/// Bounded exponential backoff for retryable fetch errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            backoff_base: Duration::try_from_secs_f64(cfg.backoff_base_secs)
                .unwrap_or(Duration::from_secs(1)),
        }
    }

    /// Whether another attempt may follow attempt `attempt` (counted from 0)
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Wait after failed attempt `attempt` (counted from 0)
    ///
    /// `base * 2^attempt`, raised to the server's `Retry-After` hint on 429.
    pub fn delay_for(&self, attempt: u32, err: &TempoError) -> Duration {
        let exponential = self
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16));
        match err {
            TempoError::RateLimit {
                retry_after: Some(secs),
            } => Duration::try_from_secs_f64(*secs)
                .map(|hint| hint.max(exponential))
                .unwrap_or(exponential),
            _ => exponential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_baseline() {
        let policy = RetryPolicy::default();
        let err = TempoError::server(500, "x");
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(4));
    }

    #[test]
    fn retry_after_raises_the_floor_only() {
        let policy = RetryPolicy::default();
        let hinted = TempoError::rate_limit(Some(10.0));
        assert_eq!(policy.delay_for(0, &hinted), Duration::from_secs(10));

        let small_hint = TempoError::rate_limit(Some(0.5));
        assert_eq!(policy.delay_for(1, &small_hint), Duration::from_secs(2));

        let no_hint = TempoError::rate_limit(None);
        assert_eq!(policy.delay_for(0, &no_hint), Duration::from_secs(1));
    }

    #[test]
    fn attempts_left() {
        let policy = RetryPolicy::default();
        assert!(policy.has_attempts_left(0));
        assert!(policy.has_attempts_left(1));
        assert!(!policy.has_attempts_left(2));
    }

    #[test]
    fn from_config_clamps() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            backoff_base_secs: 0.25,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.backoff_base, Duration::from_millis(250));
    }
}
