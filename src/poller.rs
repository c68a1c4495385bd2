//! Polling loop tying the API client to the scheduler
//!
//! One cycle fetches the configured window, publishes the result and asks
//! the scheduler for the next delay. A failed cycle keeps the previously
//! published result and retries after the error fallback interval.

use crate::config::ScheduleConfig;
use crate::error::{Result, TempoError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::scheduler::{Jitter, ScheduleTimes, ThreadRngJitter, compute_wait_time};
use crate::tempo::client::ApiClient;
use crate::tempo::timefmt::local_midnight;
use crate::tempo::types::FetchResult;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Latest published calendar, `None` until the first successful fetch
pub type SharedResult = Option<Arc<FetchResult>>;

/// Cloneable handle used to stop a running poller
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ShutdownHandle {
    /// Request shutdown; the poller stops at its next suspension point
    pub fn shutdown(&self) {
        self.tx.send(()).ok();
    }
}

pub struct TempoPoller {
    client: Arc<ApiClient>,
    timezone: Tz,
    times: ScheduleTimes,
    history_days: i64,
    lookahead_days: i64,
    error_fallback: Duration,
    jitter: Box<dyn Jitter>,
    latest_tx: watch::Sender<SharedResult>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: Option<mpsc::UnboundedReceiver<()>>,
    logger: StructuredLogger,
}

impl TempoPoller {
    pub fn new(client: Arc<ApiClient>, schedule: &ScheduleConfig) -> Result<Self> {
        let (latest_tx, _) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        let timezone = schedule.timezone()?;
        let logger = get_logger_with_context(
            LogContext::new("poller").with_field("timezone", timezone.name().to_string()),
        );
        Ok(Self {
            client,
            timezone,
            times: ScheduleTimes::from(schedule),
            history_days: schedule.history_days,
            lookahead_days: schedule.lookahead_days,
            error_fallback: Duration::from_secs(schedule.error_fallback_minutes * 60),
            jitter: Box::new(ThreadRngJitter),
            latest_tx,
            shutdown_tx,
            shutdown_rx: Some(shutdown_rx),
            logger,
        })
    }

    /// Replace the random source used by the scheduler
    pub fn with_jitter<J: Jitter + 'static>(mut self, jitter: J) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Current time in the reference timezone
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Requested range: from `history_days` before today's midnight to
    /// `lookahead_days` after it
    pub fn fetch_window(&self, now: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
        let today = now.with_timezone(&self.timezone).date_naive();
        let start = local_midnight(&self.timezone, today - TimeDelta::days(self.history_days));
        let end = local_midnight(&self.timezone, today + TimeDelta::days(self.lookahead_days));
        (start, end)
    }

    /// Run one fetch cycle as of `now` and return the delay before the next
    pub async fn poll_at(&mut self, now: DateTime<Tz>) -> Duration {
        let (start, end) = self.fetch_window(&now);
        match self.client.fetch_calendar_data(&start, &end).await {
            Ok(data) => {
                if data.is_empty() {
                    self.logger.warn("Calendar fetch returned no usable days");
                }
                let horizon = data.horizon;
                self.latest_tx.send_replace(Some(Arc::new(data)));
                compute_wait_time(&now, horizon.as_ref(), &self.times, self.jitter.as_mut())
            }
            Err(TempoError::CircuitOpen) => {
                self.logger.warn(&format!(
                    "Circuit breaker open, skipping update for {}s",
                    self.error_fallback.as_secs()
                ));
                self.error_fallback
            }
            Err(e) => {
                self.logger.error(&format!(
                    "Calendar update failed, retrying in {}s: {}",
                    self.error_fallback.as_secs(),
                    e
                ));
                self.error_fallback
            }
        }
    }

    /// Run one fetch cycle now
    pub async fn poll_once(&mut self) -> Duration {
        let now = self.now();
        self.poll_at(now).await
    }

    /// Poll until shutdown is requested
    ///
    /// Shutdown interrupts both an in-flight fetch and the wait between
    /// cycles. An interrupted fetch publishes nothing.
    pub async fn run(&mut self) -> Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .ok_or_else(|| TempoError::config("Poller is already running"))?;
        self.logger.info("Poller started");

        loop {
            let wait = tokio::select! {
                wait = self.poll_once() => wait,
                _ = shutdown_rx.recv() => break,
            };
            self.logger
                .debug(&format!("Next calendar update in {}s", wait.as_secs()));
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        self.logger.info("Shutdown signal received, poller stopped");
        self.shutdown_rx = Some(shutdown_rx);
        Ok(())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Receiver notified on every published result
    pub fn subscribe(&self) -> watch::Receiver<SharedResult> {
        self.latest_tx.subscribe()
    }

    pub fn latest(&self) -> SharedResult {
        self.latest_tx.borrow().clone()
    }
}
