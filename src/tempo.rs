//! Tempo calendar access: authentication, fetching and parsing

pub mod auth;
pub mod circuit_breaker;
pub mod client;
pub mod clock;
pub mod parser;
pub mod retry;
pub mod timefmt;
pub mod types;

pub use auth::{TokenManager, TokenSource};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{ApiClient, check_response_status};
pub use clock::{Clock, MockClock, Sleeper, SystemClock, TokioSleeper};
pub use parser::{ParseOptions, parse_response};
pub use retry::RetryPolicy;
pub use types::{CalendarDay, DateAlignedDay, FetchResult, HourShiftedDay, TempoColor};
