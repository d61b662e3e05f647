//! Parsing and display of notification timestamps.
//!
//! The backend hands timestamps back in whatever shape the column produced:
//! RFC 3339 from the API layer, `2024-05-01 10:00:00.123456+00` straight from
//! Postgres, or a naive value with no offset at all. Everything is normalized
//! to UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("timestamp is empty")]
    Empty,

    #[error("unrecognized timestamp '{0}'")]
    Unrecognized(String),
}

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(&s.replacen(' ', "T", 1)) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(s, fmt) {
            return Ok(ts.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = day.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(TimestampError::Unrecognized(s.to_string()))
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Human-friendly age of `ts` as seen at `now`.
pub fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(ts);

    if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        plural(age.num_minutes(), "minute")
    } else if age < Duration::days(1) {
        plural(age.num_hours(), "hour")
    } else if age < Duration::days(2) {
        "yesterday".to_string()
    } else if age < Duration::days(7) {
        format!("{} days ago", age.num_days())
    } else {
        ts.format("%b %-d, %Y").to_string()
    }
}

/// Full timestamp for tooltips and exports.
pub fn format_absolute(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_rfc3339_with_offsets() {
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z").unwrap(), utc(2024, 5, 1, 10, 0, 0));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00").unwrap(), utc(2024, 5, 1, 10, 0, 0));
    }

    #[test]
    fn parses_postgres_style_values() {
        let expected = utc(2024, 5, 1, 10, 0, 0);
        assert_eq!(parse_timestamp("2024-05-01 10:00:00+00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01 10:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01 15:30:00+05:30").unwrap(), expected);
        let with_fraction = parse_timestamp("2024-05-01 10:00:00.123456+00").unwrap();
        assert_eq!(with_fraction.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn naive_values_are_taken_as_utc() {
        assert_eq!(parse_timestamp("2024-05-01 10:00:00").unwrap(), utc(2024, 5, 1, 10, 0, 0));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00.5").unwrap().timestamp_subsec_millis(), 500);
        assert_eq!(parse_timestamp(" 2024-05-01 ").unwrap(), utc(2024, 5, 1, 0, 0, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("   "), Err(TimestampError::Empty));
        assert!(matches!(parse_timestamp("yesterday"), Err(TimestampError::Unrecognized(_))));
        assert!(parse_timestamp("2024-13-01 10:00:00").is_err());
    }

    #[test]
    fn relative_buckets() {
        let now = utc(2024, 5, 10, 12, 0, 0);
        let cases = [
            (now + Duration::minutes(5), "just now"),
            (now - Duration::seconds(59), "just now"),
            (now - Duration::minutes(1), "1 minute ago"),
            (now - Duration::minutes(45), "45 minutes ago"),
            (now - Duration::hours(1), "1 hour ago"),
            (now - Duration::hours(23), "23 hours ago"),
            (now - Duration::hours(30), "yesterday"),
            (now - Duration::days(3), "3 days ago"),
            (now - Duration::days(9), "May 1, 2024"),
        ];
        for (ts, expected) in cases {
            assert_eq!(format_relative(ts, now), expected, "for {ts}");
        }
    }

    #[test]
    fn absolute_format() {
        assert_eq!(format_absolute(utc(2024, 5, 1, 9, 5, 0)), "2024-05-01 09:05 UTC");
    }
}
