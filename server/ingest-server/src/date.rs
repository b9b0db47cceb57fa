//! Timestamp parsing utilities.

use chrono::DateTime;

/// Parse an RFC 3339 timestamp to Unix milliseconds.
pub fn parse_timestamp_millis(s: &str) -> Option<i64> {
  let dt = DateTime::parse_from_rfc3339(s.trim()).ok()?;
  Some(dt.timestamp_millis())
}
