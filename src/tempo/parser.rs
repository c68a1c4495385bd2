//! Calendar payload parsing
//!
//! One pass over the payload entries produces both day representations, so
//! the two lists can never disagree on which entries were kept.

use crate::error::{Result, TempoError};
use crate::logging::get_logger;
use crate::tempo::timefmt::{local_midnight, parse_api_datetime, shift_to_change_hour};
use crate::tempo::types::{CalendarDay, DateAlignedDay, FetchResult, HourShiftedDay};
use chrono_tz::Tz;
use serde_json::Value;

pub const KEY_RESULTS: &str = "tempo_like_calendars";
pub const KEY_VALUES: &str = "values";
pub const KEY_START: &str = "start_date";
pub const KEY_END: &str = "end_date";
pub const KEY_VALUE: &str = "value";
pub const KEY_UPDATED: &str = "updated_date";

/// How boundaries are interpreted while parsing
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Hour at which a tempo day begins
    pub change_hour: u32,
    /// Timezone the horizon is expressed in
    pub timezone: Tz,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            change_hour: 6,
            timezone: chrono_tz::Europe::Paris,
        }
    }
}

fn required_str<'a>(entry: &'a Value, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TempoError::parse(format!("missing field '{}'", key)))
}

fn parse_entry(entry: &Value, change_hour: u32) -> Result<(DateAlignedDay, HourShiftedDay)> {
    let start = parse_api_datetime(required_str(entry, KEY_START)?)?;
    let end = parse_api_datetime(required_str(entry, KEY_END)?)?;
    let value = required_str(entry, KEY_VALUE)?.to_string();
    let updated = parse_api_datetime(required_str(entry, KEY_UPDATED)?)?;

    let shifted = CalendarDay {
        start: shift_to_change_hour(start, change_hour)?,
        end: shift_to_change_hour(end, change_hour)?,
        value: value.clone(),
        updated,
    };
    let aligned = CalendarDay {
        start: start.date_naive(),
        end: end.date_naive(),
        value,
        updated,
    };
    Ok((aligned, shifted))
}

/// Turn a calendar payload into a [`FetchResult`]
///
/// Fails only when the payload lacks the `tempo_like_calendars.values`
/// list. Individual entries that are incomplete or carry unreadable
/// timestamps are dropped with a warning.
pub fn parse_response(payload: &Value, opts: &ParseOptions) -> Result<FetchResult> {
    let entries = payload
        .get(KEY_RESULTS)
        .and_then(|r| r.get(KEY_VALUES))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TempoError::parse(format!(
                "payload has no '{}.{}' list",
                KEY_RESULTS, KEY_VALUES
            ))
        })?;

    let logger = get_logger("parser");
    let mut date_aligned_days = Vec::with_capacity(entries.len());
    let mut hour_shifted_days = Vec::with_capacity(entries.len());

    for entry in entries {
        match parse_entry(entry, opts.change_hour) {
            Ok((aligned, shifted)) => {
                date_aligned_days.push(aligned);
                hour_shifted_days.push(shifted);
            }
            Err(e) => logger.warn(&format!("Day entry skipped due to {}: {}", e, entry)),
        }
    }

    let horizon = date_aligned_days
        .iter()
        .map(|d| d.end)
        .max()
        .map(|end| local_midnight(&opts.timezone, end));

    logger.debug(&format!(
        "Parsed {} of {} calendar entries, horizon {:?}",
        date_aligned_days.len(),
        entries.len(),
        horizon
    ));

    Ok(FetchResult {
        date_aligned_days,
        hour_shifted_days,
        horizon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Timelike};
    use chrono_tz::Europe::Paris;
    use serde_json::json;

    fn entry(start: &str, end: &str, value: &str) -> Value {
        json!({
            "start_date": format!("{}T00:00:00+01:00", start),
            "end_date": format!("{}T00:00:00+01:00", end),
            "value": value,
            "updated_date": format!("{}T10:20:00+01:00", start),
        })
    }

    fn payload(values: Vec<Value>) -> Value {
        json!({ "tempo_like_calendars": { "start_date": "x", "values": values } })
    }

    #[test]
    fn single_entry_produces_both_representations() {
        let data = parse_response(
            &payload(vec![entry("2024-01-15", "2024-01-16", "BLUE")]),
            &ParseOptions::default(),
        )
        .unwrap();

        assert_eq!(data.date_aligned_days.len(), 1);
        assert_eq!(data.hour_shifted_days.len(), 1);

        let aligned = &data.date_aligned_days[0];
        let shifted = &data.hour_shifted_days[0];
        assert_eq!(aligned.start, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(aligned.end, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(shifted.start.hour(), 6);
        assert_eq!(shifted.end.hour(), 6);
        assert_eq!(shifted.start.date_naive(), aligned.start);
        assert_eq!(shifted.value, aligned.value);
        assert_eq!(shifted.updated, aligned.updated);
    }

    #[test]
    fn incomplete_entries_are_dropped_from_both_lists() {
        let mut missing_value = entry("2024-01-16", "2024-01-17", "RED");
        missing_value.as_object_mut().unwrap().remove("value");
        let mut missing_updated = entry("2024-01-17", "2024-01-18", "RED");
        missing_updated.as_object_mut().unwrap().remove("updated_date");
        let bad_timestamp = json!({
            "start_date": "not a date",
            "end_date": "2024-01-19T00:00:00+01:00",
            "value": "WHITE",
            "updated_date": "2024-01-18T10:20:00+01:00",
        });

        let data = parse_response(
            &payload(vec![
                entry("2024-01-15", "2024-01-16", "BLUE"),
                missing_value,
                missing_updated,
                bad_timestamp,
            ]),
            &ParseOptions::default(),
        )
        .unwrap();

        assert_eq!(data.date_aligned_days.len(), 1);
        assert_eq!(data.hour_shifted_days.len(), 1);
        assert_eq!(
            data.horizon,
            Some(Paris.with_ymd_and_hms(2024, 1, 16, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn horizon_is_latest_end_regardless_of_order() {
        let data = parse_response(
            &payload(vec![
                entry("2024-01-17", "2024-01-18", "RED"),
                entry("2024-01-15", "2024-01-16", "BLUE"),
            ]),
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(
            data.horizon,
            Some(Paris.with_ymd_and_hms(2024, 1, 18, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_values_have_no_horizon() {
        let data = parse_response(&payload(vec![]), &ParseOptions::default()).unwrap();
        assert!(data.is_empty());
        assert!(data.hour_shifted_days.is_empty());
        assert_eq!(data.horizon, None);
    }

    #[test]
    fn malformed_payload_shape_fails() {
        let err = parse_response(&json!({"values": []}), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, TempoError::Parse { .. }));

        let err = parse_response(
            &json!({"tempo_like_calendars": {"values": "nope"}}),
            &ParseOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TempoError::Parse { .. }));
    }

    #[test]
    fn change_hour_is_configurable() {
        let opts = ParseOptions {
            change_hour: 7,
            ..ParseOptions::default()
        };
        let data = parse_response(&payload(vec![entry("2024-01-15", "2024-01-16", "WHITE")]), &opts)
            .unwrap();
        assert_eq!(data.hour_shifted_days[0].start.hour(), 7);
    }
}
