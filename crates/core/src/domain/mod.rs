pub mod feedback;
pub mod lead;
pub mod manager;

use chrono::{DateTime, SecondsFormat, Utc};

/// Storage spelling for timestamps. A fixed precision keeps the text
/// ordering identical to chronological ordering.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.with_timezone(&Utc))
}
