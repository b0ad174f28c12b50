use chrono::{DateTime, NaiveDateTime, Utc};

pub mod config;
pub mod gpx;
pub mod logging;
pub mod table;

pub struct DateTimeUtils {}

impl DateTimeUtils {
    /// Parses a GPX `<time>` value. Offsets are normalised to UTC.
    pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
        if let Ok(datetime) = DateTime::parse_from_rfc3339(timestamp) {
            return Some(datetime.with_timezone(&Utc));
        }

        // Some exporters drop the zone designator
        NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
