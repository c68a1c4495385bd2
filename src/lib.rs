//! # Tempo-Sync - adaptive client for the RTE Tempo tariff calendar
//!
//! Fetches the Tempo day classification (blue, white, red) from the RTE
//! open API and keeps it fresh with as few requests as possible.
//!
//! ## Features
//!
//! - **OAuth2 client credentials**: cached tokens with single-flight refresh
//! - **Resilient fetching**: bounded exponential retry and a circuit breaker
//! - **Two day views**: midnight-aligned days and days starting at the 6h change
//! - **Adaptive polling**: around two calls per day once tomorrow is published
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `tempo`: Token manager, API client, payload parser and calendar types
//! - `scheduler`: Next poll delay from the known calendar horizon
//! - `poller`: Fetch loop publishing results to consumers

pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod scheduler;
pub mod tempo;

/// Crate version, with a nightly suffix when built as such
pub const APP_VERSION: &str = env!("APP_VERSION");

/// Default `User-Agent` sent to the RTE endpoints
pub const USER_AGENT: &str = env!("APP_USER_AGENT");

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, TempoError};
pub use poller::{ShutdownHandle, TempoPoller};
pub use scheduler::compute_wait_time;
pub use tempo::{ApiClient, FetchResult, TempoColor, TokenManager};
