//! Configuration management for Tempo-Sync
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with support for environment variable overrides.

use crate::error::{Result, TempoError};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

pub use defaults::{DEFAULT_CALENDAR_ENDPOINT, DEFAULT_TOKEN_ENDPOINT};

/// Environment variable holding the OAuth2 client id
pub const ENV_CLIENT_ID: &str = "TEMPO_CLIENT_ID";
/// Environment variable holding the OAuth2 client secret
pub const ENV_CLIENT_SECRET: &str = "TEMPO_CLIENT_SECRET";
/// Environment variable overriding the log level
pub const ENV_LOG_LEVEL: &str = "TEMPO_LOG_LEVEL";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API endpoints and credentials
    pub api: ApiConfig,

    /// Retry policy around calendar fetches
    pub retry: RetryConfig,

    /// Circuit breaker thresholds
    pub circuit_breaker: CircuitBreakerConfig,

    /// Adaptive polling schedule
    pub schedule: ScheduleConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// OAuth2 credentials and endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Token endpoint (client credentials grant)
    pub token_endpoint: String,

    /// Tempo calendar endpoint
    pub calendar_endpoint: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Refresh tokens this many seconds before they expire
    pub token_expiry_margin_secs: u64,

    /// Override for the outbound User-Agent header
    pub user_agent: Option<String>,
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per fetch, first try included
    pub max_attempts: u32,

    /// Backoff base in seconds; attempt `n` (from 0) waits `base * 2^n`
    pub backoff_base_secs: f64,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// Seconds after the last failure before a probe is let through
    pub recovery_timeout_secs: u64,
}

/// Polling schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// IANA name of the reference timezone
    pub timezone: String,

    /// Hour at which a tempo day begins
    pub change_hour: u32,

    /// Confirmation checkpoint (hour part)
    pub confirm_hour: u32,

    /// Confirmation checkpoint (minute part)
    pub confirm_minute: u32,

    /// Hour of the next-day confirmation call
    pub confirm_check_hour: u32,

    /// Delay before the next cycle after a failed fetch
    pub error_fallback_minutes: u64,

    /// Days of history requested before today
    pub history_days: i64,

    /// Days requested after today
    pub lookahead_days: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory (or file path whose parent is used) for rolling log files
    pub file: Option<String>,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl ScheduleConfig {
    /// Resolve the configured timezone name
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            TempoError::validation(
                "schedule.timezone".to_string(),
                format!("Unknown timezone: {}", self.timezone),
            )
        })
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "tempo_sync.yaml",
            "/data/tempo_sync.yaml",
            "/etc/tempo-sync/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the environment in production)
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(id) = non_empty(ENV_CLIENT_ID) {
            self.api.client_id = id;
        }
        if let Some(secret) = non_empty(ENV_CLIENT_SECRET) {
            self.api.client_secret = secret;
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.token_endpoint.trim().is_empty() {
            return Err(TempoError::validation(
                "api.token_endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.api.calendar_endpoint.trim().is_empty() {
            return Err(TempoError::validation(
                "api.calendar_endpoint",
                "Endpoint cannot be empty",
            ));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(TempoError::validation(
                "api.request_timeout_secs",
                "Must be greater than 0",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(TempoError::validation(
                "retry.max_attempts",
                "Must be greater than 0",
            ));
        }

        if !self.retry.backoff_base_secs.is_finite() || self.retry.backoff_base_secs < 0.0 {
            return Err(TempoError::validation(
                "retry.backoff_base_secs",
                "Must be a non-negative number",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(TempoError::validation(
                "circuit_breaker.failure_threshold",
                "Must be greater than 0",
            ));
        }

        self.schedule.timezone()?;

        for (field, hour) in [
            ("schedule.change_hour", self.schedule.change_hour),
            ("schedule.confirm_hour", self.schedule.confirm_hour),
            ("schedule.confirm_check_hour", self.schedule.confirm_check_hour),
        ] {
            if hour > 23 {
                return Err(TempoError::validation(field, "Hour must be within 0..=23"));
            }
        }

        if self.schedule.confirm_minute > 59 {
            return Err(TempoError::validation(
                "schedule.confirm_minute",
                "Minute must be within 0..=59",
            ));
        }

        if self.schedule.error_fallback_minutes == 0 {
            return Err(TempoError::validation(
                "schedule.error_fallback_minutes",
                "Must be greater than 0",
            ));
        }

        if self.schedule.history_days < 0 || self.schedule.lookahead_days < 1 {
            return Err(TempoError::validation(
                "schedule.lookahead_days",
                "Window must cover at least tomorrow",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)?;

        Ok(())
    }

    /// Whether credentials are present
    pub fn has_credentials(&self) -> bool {
        !self.api.client_id.trim().is_empty() && !self.api.client_secret.trim().is_empty()
    }
}
