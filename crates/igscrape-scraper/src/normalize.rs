//! Field conversions shared by both backends' normalizers.

use chrono::DateTime;

/// RFC 3339 form of a Unix timestamp in seconds.
pub(crate) fn published_at(timestamp: Option<i64>) -> Option<String> {
    timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.to_rfc3339())
}

/// Treats empty strings as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
