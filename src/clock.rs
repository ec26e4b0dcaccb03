//! Timestamp formatting shared by the JSON envelopes and the text reports.

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// `2024-05-01T10:20:30.123Z`
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    iso(Utc::now())
}

/// `5/1/2024, 1:20:30 PM` in the server's local time zone.
pub fn local_display(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}
