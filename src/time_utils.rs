// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a UTC timestamp as an HTTP date (`Mon, 01 Jan 2024 00:00:00 GMT`).
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse a decimal millisecond epoch string into a UTC timestamp.
pub fn parse_epoch_millis(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

/// Parse a decimal second epoch string into a UTC timestamp.
pub fn parse_epoch_secs(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_date_from_millis() {
        let date = parse_epoch_millis("1704067200000").unwrap();
        assert_eq!(format_http_date(date), "Mon, 01 Jan 2024 00:00:00 GMT");
    }

    #[test]
    fn epoch_parsing_rejects_garbage() {
        assert!(parse_epoch_millis("soon").is_none());
        assert!(parse_epoch_secs("").is_none());
        assert_eq!(parse_epoch_secs("60").unwrap().timestamp(), 60);
    }
}
