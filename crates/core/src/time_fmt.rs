// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ISO-8601 UTC timestamp helpers.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Format a UTC instant as ISO-8601 with millisecond precision.
pub fn format_iso_utc(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current wall-clock time as an ISO-8601 UTC string.
pub fn iso_now() -> String {
    format_iso_utc(Utc::now())
}

/// Convert epoch milliseconds to an ISO-8601 UTC string.
pub fn epoch_ms_to_iso(ms: u64) -> String {
    match Utc.timestamp_millis_opt(ms as i64).single() {
        Some(t) => format_iso_utc(t),
        None => format_iso_utc(Utc::now()),
    }
}

/// Parse an ISO-8601 timestamp; `None` on any malformed input.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Make a timestamp safe for use in a file name.
///
/// Replaces `:` and `.` so the result stays within the task-id character
/// class.
pub fn sanitize_timestamp(ts: &str) -> String {
    ts.chars()
        .map(|c| if matches!(c, ':' | '.') { '-' } else { c })
        .collect()
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
