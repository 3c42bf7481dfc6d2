//! Epoch timestamp decoding.
//!
//! Kline files carry open/close times as integer epochs. Older spot files use
//! milliseconds (13 digits); spot files from 2025 on use microseconds
//! (16 digits). The unit is detected per value by magnitude.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Epoch values at or above this are microseconds.
pub const MICROSECOND_THRESHOLD: i64 = 10_000_000_000_000;

/// Layout of metrics snapshot times.
pub const METRICS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decodes an integer epoch in milliseconds or microseconds.
#[must_use]
pub fn parse_epoch(field: &str) -> Option<DateTime<Utc>> {
    let raw: i64 = field.trim().parse().ok()?;
    if raw < 0 {
        return None;
    }
    if raw < MICROSECOND_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp_micros(raw)
    }
}

/// Decodes a `YYYY-MM-DD HH:MM:SS` UTC time.
#[must_use]
pub fn parse_datetime(field: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(field.trim(), METRICS_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_and_micros_agree() {
        let millis = parse_epoch("1672531200000").unwrap();
        let micros = parse_epoch("1672531200000000").unwrap();
        assert_eq!(millis, micros);
        assert_eq!(millis.to_rfc3339(), "2023-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_sub_millisecond_precision_kept() {
        let t = parse_epoch("1735689600000123").unwrap();
        assert_eq!(t.timestamp_subsec_micros(), 123);
    }

    #[test]
    fn test_rejects_non_epochs() {
        assert!(parse_epoch("open_time").is_none());
        assert!(parse_epoch("").is_none());
        assert!(parse_epoch("-5").is_none());
        assert!(parse_epoch("1.5").is_none());
    }

    #[test]
    fn test_parse_datetime() {
        let t = parse_datetime("2023-01-01 00:05:00").unwrap();
        assert_eq!(t.timestamp(), 1_672_531_500);
        assert!(parse_datetime("create_time").is_none());
    }
}
