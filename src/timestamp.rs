//! Timestamps used in generated service names and export file names.

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

const FULL_FORMAT: &[FormatItem<'static>] = format_description!(
    "[year][month][day]_[hour][minute][second]_[subsecond digits:6]"
);

/// Current local time, falling back to UTC when the offset is unknown.
pub fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Format `now` as `YYYYMMDD_HHMMSS_micros`.
pub fn full_timestamp_at(now: OffsetDateTime) -> String {
    now.format(FULL_FORMAT)
        .unwrap_or_else(|_| now.unix_timestamp_nanos().to_string())
}

/// Full timestamp for the current instant.
pub fn full_timestamp() -> String {
    full_timestamp_at(now_local_or_utc())
}
