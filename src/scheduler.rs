//! Adaptive poll scheduling
//!
//! The next delay depends on how far ahead the calendar is known. With
//! tomorrow's color published the poller sleeps until the next day change
//! (or a confirmation call); without it, it wakes around the change hour or
//! retries every half hour. Every branch draws its final number of seconds
//! from an injected [`Jitter`] source so deployments do not poll in lockstep.

use crate::config::ScheduleConfig;
use crate::logging::get_logger;
use crate::tempo::timefmt::at_local_time;
use chrono::{DateTime, TimeDelta, TimeZone, Timelike};
use rand::Rng;
use std::ops::Range;
use std::time::Duration;

/// Wait when no calendar data is known yet
pub const NO_DATA_WAIT: Duration = Duration::from_secs(10 * 60);

const SHORT_RETRY_SECS: i64 = 30 * 60;
const FALLBACK_SECS: i64 = 60 * 60;
const SPREAD_SECS: i64 = 900;

/// Source of uniformly distributed integers
pub trait Jitter: Send {
    /// Draw from the half-open `range`; an empty range yields `range.start`
    fn uniform(&mut self, range: Range<i64>) -> i64;
}

impl<F> Jitter for F
where
    F: FnMut(Range<i64>) -> i64 + Send,
{
    fn uniform(&mut self, range: Range<i64>) -> i64 {
        self(range)
    }
}

/// Jitter backed by the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl Jitter for ThreadRngJitter {
    fn uniform(&mut self, range: Range<i64>) -> i64 {
        if range.is_empty() {
            return range.start;
        }
        rand::rng().random_range(range)
    }
}

/// Fixed wall-clock points the schedule is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTimes {
    pub change_hour: u32,
    pub confirm_hour: u32,
    pub confirm_minute: u32,
    pub confirm_check_hour: u32,
}

impl Default for ScheduleTimes {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for ScheduleTimes {
    fn from(cfg: &ScheduleConfig) -> Self {
        Self {
            change_hour: cfg.change_hour,
            confirm_hour: cfg.confirm_hour,
            confirm_minute: cfg.confirm_minute,
            confirm_check_hour: cfg.confirm_check_hour,
        }
    }
}

fn whole_secs<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> i64 {
    to.clone().signed_duration_since(from.clone()).num_seconds()
}

fn spread(base: i64, range: Range<i64>, jitter: &mut dyn Jitter) -> i64 {
    let drawn = jitter.uniform(range);
    tracing::trace!(base, drawn, "Applied schedule jitter");
    drawn
}

/// Delay until the next poll
///
/// `horizon` is the first midnight not covered by known data. Days are
/// compared as calendar dates in `now`'s timezone. Never returns zero.
pub fn compute_wait_time<Tz: TimeZone>(
    now: &DateTime<Tz>,
    horizon: Option<&DateTime<Tz>>,
    times: &ScheduleTimes,
    jitter: &mut dyn Jitter,
) -> Duration {
    let logger = get_logger("scheduler");
    let Some(horizon) = horizon else {
        logger.debug("No calendar data yet, polling again soon");
        return NO_DATA_WAIT;
    };

    let tz = now.timezone();
    let today = now.date_naive();
    let tomorrow = today + TimeDelta::days(1);
    let diff = horizon
        .with_timezone(&tz)
        .date_naive()
        .signed_duration_since(today)
        .num_days();

    let secs = match diff {
        2 => {
            let checkpoint = at_local_time(&tz, today, times.confirm_hour, times.confirm_minute, 0);
            if *now > checkpoint {
                let next_call = at_local_time(&tz, tomorrow, times.change_hour, 0, 0);
                let base = whole_secs(now, &next_call);
                let secs = spread(base, base..base + SPREAD_SECS, jitter);
                logger.info(&format!(
                    "Next day color known, waiting until tomorrow ({}s)",
                    secs
                ));
                secs
            } else {
                let next_call = at_local_time(&tz, tomorrow, times.confirm_check_hour, 0, 0);
                let base = whole_secs(now, &next_call);
                let secs = spread(base, base - SPREAD_SECS..base + SPREAD_SECS, jitter);
                logger.info(&format!(
                    "Next day color known but not yet confirmed, waiting for confirmation call ({}s)",
                    secs
                ));
                secs
            }
        }
        1 => {
            if now.hour() < times.change_hour {
                // One second past the boundary so the new day is published
                let change = at_local_time(&tz, today, times.change_hour, 0, 1);
                let base = whole_secs(now, &change);
                let secs = spread(base, base..base + SPREAD_SECS, jitter);
                logger.debug(&format!(
                    "No next day color, waiting for the {}h change ({}s)",
                    times.change_hour, secs
                ));
                secs
            } else {
                let base = SHORT_RETRY_SECS;
                let secs = spread(base, base * 5 / 6..base * 7 / 6, jitter);
                logger.debug(&format!(
                    "No next day color after the {}h change, retrying soon ({}s)",
                    times.change_hour, secs
                ));
                secs
            }
        }
        other => {
            let base = FALLBACK_SECS;
            let secs = spread(base, base * 5 / 6..base * 7 / 6, jitter);
            logger.warn(&format!(
                "Unexpected calendar horizon ({} days ahead), falling back to {}s",
                other, secs
            ));
            secs
        }
    };

    Duration::from_secs(u64::try_from(secs).unwrap_or(0).max(1))
}
