//! Timestamp helpers. Stored timestamps are UTC RFC 3339 with millisecond
//! precision so string order equals time order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{DatabaseError, DatabaseResult};

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn parse_timestamp(value: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidValue(format!("bad timestamp '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let later = early + Duration::milliseconds(5);
        assert!(format_timestamp(early) < format_timestamp(later));
        assert_eq!(format_timestamp(early), "2026-03-01T09:00:00.000Z");
    }

    #[test]
    fn parse_round_trips() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(at)).unwrap(), at);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
