//! Timestamp codec for the calendar API and local wall-clock helpers
//!
//! The API writes UTC offsets with a colon (`+01:00`) and expects the same
//! shape in query parameters. Incoming timestamps have the colon removed
//! before being parsed with [`API_DATE_FORMAT`].

use crate::error::{Result, TempoError};
use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
};
use std::fmt::Display;

/// strftime layout of API timestamps once the offset colon is removed
pub const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Format a timestamp for a query parameter, e.g. `2024-01-14T00:00:00+01:00`
pub fn format_api_datetime<Tz>(dt: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let compact = dt.format(API_DATE_FORMAT).to_string();
    let (head, tail) = compact.split_at(compact.len().saturating_sub(2));
    format!("{}:{}", head, tail)
}

fn strip_offset_colon(s: &str) -> String {
    if let Some(rest) = s.strip_suffix('Z') {
        return format!("{}+0000", rest);
    }
    let bytes = s.as_bytes();
    let n = bytes.len();
    if n >= 6 && bytes[n - 3] == b':' && matches!(bytes[n - 6], b'+' | b'-') {
        format!("{}{}", &s[..n - 3], &s[n - 2..])
    } else {
        s.to_string()
    }
}

/// Parse an API timestamp, keeping the offset it was written with
pub fn parse_api_datetime(s: &str) -> Result<DateTime<FixedOffset>> {
    let compact = strip_offset_colon(s.trim());
    DateTime::parse_from_str(&compact, API_DATE_FORMAT)
        .map_err(|e| TempoError::parse(format!("invalid API timestamp '{}': {}", s, e)))
}

/// Calendar date of an API timestamp, in the offset it was written with
pub fn parse_api_date(s: &str) -> Result<NaiveDate> {
    Ok(parse_api_datetime(s)?.date_naive())
}

/// Move a midnight-aligned boundary to the hour the tempo day really starts
pub fn shift_to_change_hour(
    dt: DateTime<FixedOffset>,
    change_hour: u32,
) -> Result<DateTime<FixedOffset>> {
    dt.checked_add_signed(TimeDelta::hours(i64::from(change_hour)))
        .ok_or_else(|| TempoError::parse(format!("timestamp out of range: {}", dt)))
}

/// Resolve a wall-clock time in `tz`
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times inside
/// a DST gap resolve to the first valid instant an hour later.
pub fn at_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

/// Midnight of `date` in `tz`
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    at_local(tz, date.and_time(NaiveTime::MIN))
}

/// `date` at `hour:minute:second` in `tz`; out-of-range parts yield midnight
pub fn at_local_time<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
    second: u32,
) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN);
    at_local(tz, date.and_time(time))
}
