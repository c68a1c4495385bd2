//! OAuth2 client-credentials token manager
//!
//! Tokens are cached until `expires_in - margin` seconds after they were
//! requested. Concurrent callers share one in-flight refresh: the fast path
//! reads the cache without waiting, the slow path takes the refresh lock and
//! checks the cache again before going to the network.

use crate::config::ApiConfig;
use crate::error::{Result, TempoError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::tempo::clock::{Clock, SystemClock};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Lifetime assumed when the token response has no `expires_in`
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Anything able to hand out a bearer token
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

#[derive(Debug, Clone)]
struct Token {
    access_token: String,
    expires_at: Instant,
}

/// Short, non-secret label for a client id, used in log context
pub(crate) fn client_label(client_id: &str) -> String {
    let prefix: String = client_id.chars().take(6).collect();
    if prefix.len() < client_id.len() {
        format!("{}...", prefix)
    } else {
        prefix
    }
}

/// Caching token manager for one credential pair
pub struct TokenManager {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
    user_agent: String,
    timeout: Duration,
    expiry_margin: Duration,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<Token>>,
    refresh_lock: tokio::sync::Mutex<()>,
    logger: StructuredLogger,
}

impl TokenManager {
    /// Create a token manager sharing the given HTTP transport
    pub fn new(http: reqwest::Client, cfg: &ApiConfig) -> Self {
        let logger = get_logger_with_context(
            LogContext::new("auth").with_client_label(client_label(&cfg.client_id)),
        );
        Self {
            http,
            endpoint: cfg.token_endpoint.clone(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            user_agent: cfg
                .user_agent
                .clone()
                .unwrap_or_else(|| crate::USER_AGENT.to_string()),
            timeout: Duration::from_secs(cfg.request_timeout_secs),
            expiry_margin: Duration::from_secs(cfg.token_expiry_margin_secs),
            clock: Arc::new(SystemClock),
            cached: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            logger,
        }
    }

    /// Replace the monotonic clock used for expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get a valid access token, refreshing it if necessary
    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        self.fetch_token().await
    }

    fn cached_token(&self) -> Option<String> {
        let now = self.clock.now();
        let guard = self.cached.read().ok()?;
        guard
            .as_ref()
            .filter(|t| now < t.expires_at)
            .map(|t| t.access_token.clone())
    }

    async fn fetch_token(&self) -> Result<String> {
        self.logger.debug("Requesting new OAuth2 access token");
        let requested_at = self.clock.now();

        let resp = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                TempoError::connection(format!("Connection error during token request: {}", e))
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TempoError::auth("Invalid client credentials (HTTP 401)"));
        }
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(TempoError::auth(format!(
                "Token request failed (HTTP {}): {}",
                status.as_u16(),
                text
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| TempoError::auth(format!("Invalid token response: {}", e)))?;
        let (access_token, expires_in) = parse_token_response(&body)?;

        let lifetime = Duration::from_secs(expires_in).saturating_sub(self.expiry_margin);
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(Token {
                access_token: access_token.clone(),
                expires_at: requested_at + lifetime,
            });
        }
        self.logger
            .debug(&format!("OAuth2 token acquired, expires in {}s", expires_in));
        Ok(access_token)
    }
}

#[async_trait::async_trait]
impl TokenSource for TokenManager {
    async fn access_token(&self) -> Result<String> {
        self.get_access_token().await
    }
}

fn parse_token_response(body: &Value) -> Result<(String, u64)> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| TempoError::auth("Invalid token response: missing access_token"))?
        .to_string();

    let expires_in = match body.get("expires_in") {
        None | Some(Value::Null) => DEFAULT_EXPIRES_IN_SECS,
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok()))
            .ok_or_else(|| {
                TempoError::auth(format!(
                    "Invalid token response: expires_in is not an integer ({})",
                    v
                ))
            })?,
    };

    Ok((access_token, expires_in))
}
