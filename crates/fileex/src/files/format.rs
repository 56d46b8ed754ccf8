//! Human-readable size and time formatting.

use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};

/// Units used by [`format_size`], 1024-based.
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Display format for timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a byte count with two decimals, e.g. `1536` becomes `1.50 KB`.
///
/// Zero renders as `0 B`. Values beyond the terabyte range stay in `TB`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

/// Render an instant as `YYYY-MM-DD HH:MM:SS` in local time.
pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format(TIMESTAMP_FORMAT).to_string()
}

/// Render a parsed timestamp in local time, same layout as [`format_timestamp`].
pub fn format_datetime<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    time.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// Render an instant as RFC 3339 with the local offset.
pub fn format_iso8601(time: DateTime<Local>) -> String {
    time.to_rfc3339()
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an offset, and offset-less values such as
/// `2024-05-01T10:20:30.123456`, which are taken as local time.
pub fn parse_iso8601(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_size_zero() {
        assert_eq!(format_size(0), "0 B");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(1), "1.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
        assert_eq!(format_size(1099511627776), "1.00 TB");
    }

    #[test]
    fn test_format_size_caps_at_terabytes() {
        assert_eq!(format_size(1024 * 1099511627776), "1024.00 TB");
    }

    #[test]
    fn test_format_timestamp_layout() {
        let rendered = format_timestamp(SystemTime::UNIX_EPOCH + Duration::from_secs(1704067200));

        // Local time varies with the host timezone, the layout does not.
        assert_eq!(rendered.len(), 19);
        assert_eq!(&rendered[4..5], "-");
        assert_eq!(&rendered[10..11], " ");
        assert_eq!(&rendered[13..14], ":");
    }

    #[test]
    fn test_iso8601_roundtrip() {
        let now = Local::now();
        let text = format_iso8601(now);
        let parsed = parse_iso8601(&text).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_offsetless_timestamp() {
        let parsed = parse_iso8601("2024-05-01T10:20:30.123456").unwrap();
        assert_eq!(
            parsed.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-05-01 10:20:30"
        );

        assert!(parse_iso8601("2024-05-01T10:20:30").is_some());
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(parse_iso8601("").is_none());
        assert!(parse_iso8601("yesterday").is_none());
        assert!(parse_iso8601("2024-13-45T99:00:00").is_none());
    }

    #[test]
    fn test_format_datetime_matches_timestamp() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1704067200);
        let datetime = DateTime::<Local>::from(time);
        assert_eq!(format_datetime(&datetime), format_timestamp(time));
    }
}
