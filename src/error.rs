//! Error types and handling for Tempo-Sync
//!
//! A single closed error enum covers both the remote API failures (which
//! drive retry and circuit breaker decisions) and the ambient failures of
//! configuration, logging and I/O.

use thiserror::Error;

/// Result type alias for Tempo-Sync operations
pub type Result<T> = std::result::Result<T, TempoError>;

fn retry_after_suffix(retry_after: &Option<f64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {}s", secs),
        None => String::new(),
    }
}

/// Main error type for Tempo-Sync
#[derive(Debug, Error)]
pub enum TempoError {
    /// Invalid or expired credentials, or a malformed token response
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// HTTP 4xx other than 401 and 429
    #[error("Client error: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    /// HTTP 429, with the server's `Retry-After` hint in seconds when numeric
    #[error("Rate limited (HTTP 429){}", retry_after_suffix(.retry_after))]
    RateLimit { retry_after: Option<f64> },

    /// HTTP 5xx
    #[error("Server error: HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// Transport failures: DNS, refused connection, timeout
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Circuit breaker rejected the call without touching the network
    #[error("Circuit breaker is open, rejecting calls")]
    CircuitOpen,

    /// Any status the API contract does not describe
    #[error("Unexpected HTTP {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// Payload structure could not be interpreted
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl TempoError {
    /// Create a new authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        TempoError::Auth {
            message: message.into(),
        }
    }

    /// Create a new client (4xx) error
    pub fn client<S: Into<String>>(status: u16, message: S) -> Self {
        TempoError::Client {
            status,
            message: message.into(),
        }
    }

    /// Create a new rate limit error
    pub fn rate_limit(retry_after: Option<f64>) -> Self {
        TempoError::RateLimit { retry_after }
    }

    /// Create a new server (5xx) error
    pub fn server<S: Into<String>>(status: u16, message: S) -> Self {
        TempoError::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        TempoError::Connection {
            message: message.into(),
        }
    }

    /// Create a new unexpected status error
    pub fn unexpected_status<S: Into<String>>(status: u16, message: S) -> Self {
        TempoError::UnexpectedStatus {
            status,
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        TempoError::Parse {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        TempoError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        TempoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        TempoError::Io {
            message: message.into(),
        }
    }

    /// Whether the retry loop may try again after this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TempoError::Server { .. } | TempoError::RateLimit { .. } | TempoError::Connection { .. }
        )
    }

    /// Whether the circuit breaker records this error as a failure
    pub fn counts_as_failure(&self) -> bool {
        self.is_retryable() || matches!(self, TempoError::Auth { .. } | TempoError::Client { .. })
    }

}

impl From<std::io::Error> for TempoError {
    fn from(err: std::io::Error) -> Self {
        TempoError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for TempoError {
    fn from(err: serde_yaml::Error) -> Self {
        TempoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TempoError {
    fn from(err: serde_json::Error) -> Self {
        TempoError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for TempoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TempoError::connection(format!("Request timeout: {}", err))
        } else {
            TempoError::connection(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for TempoError {
    fn from(err: chrono::ParseError) -> Self {
        TempoError::parse(format!("invalid timestamp: {}", err))
    }
}
