//! Calendar API client
//!
//! Wraps the calendar endpoint with status classification, bounded
//! exponential retry and a circuit breaker. The breaker sits in a plain
//! mutex that is never held across an await point.

use crate::config::Config;
use crate::error::{Result, TempoError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::tempo::auth::TokenSource;
use crate::tempo::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::tempo::clock::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::tempo::parser::{ParseOptions, parse_response};
use crate::tempo::retry::RetryPolicy;
use crate::tempo::timefmt::format_api_datetime;
use crate::tempo::types::FetchResult;
use chrono::{DateTime, TimeZone};
use reqwest::header::{ACCEPT, HeaderMap, RETRY_AFTER, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Numeric `Retry-After` value in seconds; HTTP-date forms are ignored
pub fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Map a response status onto the error taxonomy
///
/// 200 passes, 401 is an authentication error, 429 is rate limiting, any
/// other 4xx is a client error and 5xx is a server error. Everything else
/// (redirects, other 2xx) is reported as an unexpected status.
pub fn check_response_status(status: StatusCode, headers: &HeaderMap) -> Result<()> {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("unknown status");
    match code {
        200 => Ok(()),
        401 => Err(TempoError::auth(format!("Unauthorized (HTTP 401): {}", reason))),
        429 => Err(TempoError::rate_limit(parse_retry_after(headers))),
        400..=499 => Err(TempoError::client(code, reason)),
        500..=599 => Err(TempoError::server(code, reason)),
        _ => Err(TempoError::unexpected_status(code, reason)),
    }
}

/// Client for the tempo calendar endpoint
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
    user_agent: String,
    timeout: Duration,
    tokens: Arc<dyn TokenSource>,
    retry: RetryPolicy,
    breaker: Mutex<CircuitBreaker>,
    sleeper: Arc<dyn Sleeper>,
    parse_options: ParseOptions,
    logger: StructuredLogger,
}

impl ApiClient {
    /// Build a client from the full configuration
    ///
    /// Fails only if the configured timezone is unknown.
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>, cfg: &Config) -> Result<Self> {
        let parse_options = ParseOptions {
            change_hour: cfg.schedule.change_hour,
            timezone: cfg.schedule.timezone()?,
        };
        let logger = get_logger_with_context(
            LogContext::new("api_client")
                .with_client_label(crate::tempo::auth::client_label(&cfg.api.client_id)),
        );
        Ok(Self {
            http,
            endpoint: cfg.api.calendar_endpoint.clone(),
            user_agent: cfg
                .api
                .user_agent
                .clone()
                .unwrap_or_else(|| crate::USER_AGENT.to_string()),
            timeout: Duration::from_secs(cfg.api.request_timeout_secs),
            tokens,
            retry: RetryPolicy::from_config(&cfg.retry),
            breaker: Mutex::new(CircuitBreaker::new(
                &cfg.circuit_breaker,
                Arc::new(SystemClock),
            )),
            sleeper: Arc::new(TokioSleeper),
            parse_options,
            logger,
        })
    }

    /// Replace the sleeper used between retry attempts
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replace the clock the circuit breaker measures recovery against
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        if let Ok(breaker) = self.breaker.get_mut() {
            breaker.set_clock(clock);
        }
        self
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker
            .lock()
            .map(|b| b.state())
            .unwrap_or(CircuitState::Open)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.breaker
            .lock()
            .map(|b| b.consecutive_failures())
            .unwrap_or(0)
    }

    fn breaker_check(&self) -> Result<()> {
        match self.breaker.lock() {
            Ok(mut b) => b.check(),
            Err(_) => Err(TempoError::CircuitOpen),
        }
    }

    fn record_success(&self) {
        if let Ok(mut b) = self.breaker.lock() {
            b.on_success();
        }
    }

    fn record_failure(&self) {
        if let Ok(mut b) = self.breaker.lock() {
            b.on_failure();
        }
    }

    async fn authorized_get(&self) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http
            .get(&self.endpoint)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout))
    }

    async fn fetch_once(&self, start_date: &str, end_date: &str) -> Result<Value> {
        let resp = self
            .authorized_get()
            .await?
            .query(&[("start_date", start_date), ("end_date", end_date)])
            .send()
            .await?;
        check_response_status(resp.status(), resp.headers())?;

        let body = resp.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| TempoError::parse(format!("Invalid calendar response body: {}", e)))
    }

    /// Fetch and parse the calendar between `start` and `end`
    ///
    /// Rejected immediately with [`TempoError::CircuitOpen`] while the
    /// breaker is cooling down. Retryable failures are retried with
    /// exponential backoff; every failed attempt of a counted kind is
    /// recorded on the breaker.
    pub async fn fetch_calendar_data<Tz>(
        &self,
        start: &DateTime<Tz>,
        end: &DateTime<Tz>,
    ) -> Result<FetchResult>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.breaker_check()?;

        let start_date = format_api_datetime(start);
        let end_date = format_api_datetime(end);
        self.logger.debug(&format!(
            "Fetching calendar from {} to {}",
            start_date, end_date
        ));

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(&start_date, &end_date).await {
                Ok(payload) => {
                    let data = parse_response(&payload, &self.parse_options)?;
                    self.record_success();
                    self.logger.debug(&format!(
                        "Calendar fetched: {} days",
                        data.date_aligned_days.len()
                    ));
                    return Ok(data);
                }
                Err(err) => {
                    if err.counts_as_failure() {
                        self.record_failure();
                    }
                    if !err.is_retryable() || !self.retry.has_attempts_left(attempt) {
                        return Err(err);
                    }
                    let wait = self.retry.delay_for(attempt, &err);
                    self.logger.warn(&format!(
                        "Attempt {}/{} failed, retrying in {:.1}s: {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        wait.as_secs_f64(),
                        err
                    ));
                    self.sleeper.sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One unguarded request to the calendar endpoint
    ///
    /// Used at startup to validate credentials. Neither consults nor updates
    /// the circuit breaker and never retries.
    pub async fn test_credentials(&self) -> Result<()> {
        let resp = self.authorized_get().await?.send().await?;
        check_response_status(resp.status(), resp.headers())?;
        self.logger.info("Credentials accepted by calendar endpoint");
        Ok(())
    }
}
