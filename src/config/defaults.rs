use super::*;

/// OAuth2 token endpoint of the RTE data portal
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://digital.iservices.rte-france.com/token/oauth/";

/// Tempo-like calendar endpoint of the RTE data portal
pub const DEFAULT_CALENDAR_ENDPOINT: &str = "https://digital.iservices.rte-france.com/open_api/tempo_like_supply_contract/v1/tempo_like_calendars";

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            calendar_endpoint: DEFAULT_CALENDAR_ENDPOINT.to_string(),
            request_timeout_secs: 10,
            token_expiry_margin_secs: 60,
            user_agent: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 1.0,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 300,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/Paris".to_string(),
            change_hour: 6,
            confirm_hour: 10,
            confirm_minute: 30,
            confirm_check_hour: 11,
            error_fallback_minutes: 10,
            history_days: 364,
            lookahead_days: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
