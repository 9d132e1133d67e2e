use chrono::{DateTime, Utc};

/// Wire format for every `timestamp` field: naive UTC, microsecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}
