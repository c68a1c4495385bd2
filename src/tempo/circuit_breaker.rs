//! Circuit breaker guarding the calendar endpoint
//!
//! Closed -> Open after `failure_threshold` consecutive failures. While
//! open, calls are rejected until `recovery_timeout` has passed since the
//! last failure; the next call then goes through as a half-open probe.
//! Any success closes the circuit again.

use crate::config::CircuitBreakerConfig;
use crate::error::{Result, TempoError};
use crate::logging::{StructuredLogger, get_logger};
use crate::tempo::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally
    Closed,
    /// Calls are rejected without touching the network
    Open,
    /// Recovery timeout elapsed; the next call probes the remote side
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    clock: Arc<dyn Clock>,
    logger: StructuredLogger,
}

impl CircuitBreaker {
    pub fn new(cfg: &CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            failure_threshold: cfg.failure_threshold.max(1),
            recovery_timeout: Duration::from_secs(cfg.recovery_timeout_secs),
            clock,
            logger: get_logger("circuit_breaker"),
        }
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Gate a call: `Err(CircuitOpen)` while open and still cooling down
    pub fn check(&mut self) -> Result<()> {
        if self.state != CircuitState::Open {
            return Ok(());
        }
        let since_failure = self
            .last_failure
            .map(|t| self.clock.now().saturating_duration_since(t))
            .unwrap_or(Duration::MAX);
        if since_failure >= self.recovery_timeout {
            self.logger.debug("Circuit breaker: transitioning to half-open");
            self.state = CircuitState::HalfOpen;
            Ok(())
        } else {
            Err(TempoError::CircuitOpen)
        }
    }

    pub fn on_success(&mut self) {
        if self.state != CircuitState::Closed {
            self.logger.info("Circuit breaker: closing after success");
        }
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
    }

    pub fn on_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(self.clock.now());
        if self.consecutive_failures >= self.failure_threshold {
            if self.state != CircuitState::Open {
                self.logger.warn(&format!(
                    "Circuit breaker: opening after {} failures",
                    self.consecutive_failures
                ));
            }
            self.state = CircuitState::Open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::clock::MockClock;

    fn breaker(clock: &MockClock) -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerConfig::default(), Arc::new(clock.clone()))
    }

    #[test]
    fn opens_at_threshold() {
        let clock = MockClock::new();
        let mut cb = breaker(&clock);
        for _ in 0..4 {
            cb.on_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.check().is_ok());

        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.check(), Err(TempoError::CircuitOpen)));
    }

    #[test]
    fn half_open_after_recovery_then_closes() {
        let clock = MockClock::new();
        let mut cb = breaker(&clock);
        for _ in 0..5 {
            cb.on_failure();
        }
        clock.advance(Duration::from_secs(299));
        assert!(cb.check().is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert!(cb.check().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.on_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
    }

    #[test]
    fn failed_probe_reopens_immediately() {
        let clock = MockClock::new();
        let mut cb = breaker(&clock);
        for _ in 0..5 {
            cb.on_failure();
        }
        clock.advance(Duration::from_secs(300));
        assert!(cb.check().is_ok());
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.check().is_err());
    }

    #[test]
    fn success_resets_counter() {
        let clock = MockClock::new();
        let mut cb = breaker(&clock);
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(cb.state().as_str(), "closed");
    }
}
