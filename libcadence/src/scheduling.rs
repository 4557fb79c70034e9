//! Time utilities for scheduling
//!
//! Parses operator-supplied post times and computes the calendar windows
//! and daily trigger instants used by the recurrence expander.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

use crate::{CadenceError, Result};

/// Parse a post time relative to `now`.
///
/// Supports, in order:
/// - RFC 3339 timestamps: "2025-11-20T15:00:00Z"
/// - Relative durations: "30m", "2h", "+1d"
/// - Natural language: "tomorrow 3pm", "next monday 10am"
///
/// # Errors
///
/// Returns `CadenceError::Validation` if no format matches.
pub fn parse_post_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CadenceError::Validation(
            "Post time cannot be empty".to_string(),
        ));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(duration) = parse_duration(input.trim_start_matches('+')) {
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        CadenceError::Validation(format!("Could not parse post time '{}': {}", input, e))
    })
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| CadenceError::Validation(format!("Could not parse duration: {}", e)))?;
    let seconds = i64::try_from(std_duration.as_secs())
        .map_err(|_| CadenceError::Validation("Duration out of range".to_string()))?;
    Duration::try_seconds(seconds)
        .ok_or_else(|| CadenceError::Validation("Duration out of range".to_string()))
}

/// Start (inclusive) and end (exclusive) of the UTC calendar day containing `now`.
pub fn day_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::default()));
    (start, start + Duration::days(1))
}

/// Next instant strictly after `now` at which the clock reads `hour:00` UTC.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let hour = hour.min(23);
    let today = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), hour, 0, 0)
        .single()
        .unwrap_or(now);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_rfc3339() {
        let now = at("2025-03-03T08:00:00Z");
        let parsed = parse_post_time("2025-03-03T15:30:00+02:00", now).unwrap();
        assert_eq!(parsed, at("2025-03-03T13:30:00Z"));
    }

    #[test]
    fn test_parse_relative_duration() {
        let now = at("2025-03-03T08:00:00Z");
        assert_eq!(parse_post_time("30m", now).unwrap(), at("2025-03-03T08:30:00Z"));
        assert_eq!(parse_post_time("+2h", now).unwrap(), at("2025-03-03T10:00:00Z"));
        assert_eq!(parse_post_time("1d", now).unwrap(), at("2025-03-04T08:00:00Z"));
    }

    #[test]
    fn test_parse_natural_language() {
        let now = at("2025-03-03T08:00:00Z");
        let parsed = parse_post_time("tomorrow", now).unwrap();
        assert!(parsed > now);
        assert!(parsed - now <= Duration::days(2));
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        let now = Utc::now();
        assert!(matches!(
            parse_post_time("  ", now),
            Err(CadenceError::Validation(_))
        ));
        assert!(parse_post_time("not a time at all", now).is_err());
    }

    #[test]
    fn test_day_window() {
        let (start, end) = day_window(at("2025-03-03T17:45:12Z"));
        assert_eq!(start, at("2025-03-03T00:00:00Z"));
        assert_eq!(end, at("2025-03-04T00:00:00Z"));
    }

    #[test]
    fn test_day_window_at_midnight() {
        let (start, end) = day_window(at("2025-03-03T00:00:00Z"));
        assert_eq!(start, at("2025-03-03T00:00:00Z"));
        assert_eq!(end, at("2025-03-04T00:00:00Z"));
    }

    #[test]
    fn test_next_daily_run_later_today() {
        let next = next_daily_run(at("2025-03-03T04:10:00Z"), 6);
        assert_eq!(next, at("2025-03-03T06:00:00Z"));
    }

    #[test]
    fn test_next_daily_run_rolls_to_tomorrow() {
        assert_eq!(
            next_daily_run(at("2025-03-03T00:00:00Z"), 0),
            at("2025-03-04T00:00:00Z")
        );
        assert_eq!(
            next_daily_run(at("2025-03-31T23:30:00Z"), 0),
            at("2025-04-01T00:00:00Z")
        );
    }
}
