//! Timestamp parsing and rendering
//!
//! Metadata timestamps come in several dialects:
//!
//! | Source         | Example                          | Zone        |
//! |----------------|----------------------------------|-------------|
//! | EXIF           | `2021:03:04 10:11:12`            | none (wall) |
//! | XMP / OOXML    | `2021-03-04T10:11:12+01:00`      | optional    |
//! | PDF            | `D:20210304101112+01'00'`        | optional    |
//! | RFC 2822 mail  | `Thu, 04 Mar 2021 10:11:12 +0100`| required    |
//!
//! Zone-aware values are rendered in UTC; EXIF wall-clock values are
//! rendered as recorded.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Render layout used for every timestamp in findings
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a wall-clock timestamp
pub fn format_naive(value: &NaiveDateTime) -> String {
    value.format(DISPLAY_FORMAT).to_string()
}

/// Render a zone-aware timestamp in UTC
pub fn format_utc<Tz: TimeZone>(value: &DateTime<Tz>) -> String {
    format!("{} UTC", value.with_timezone(&Utc).format(DISPLAY_FORMAT))
}

// =============================================================================
// Parsers
// =============================================================================

/// Parse an EXIF or XMP date into wall-clock time.
///
/// Any zone designator on XMP values is dropped so that XMP and EXIF values
/// compare on the same footing.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim().trim_end_matches('\0');
    if value.is_empty() || value.starts_with("0000") {
        return None;
    }

    for fmt in ["%Y:%m:%d %H:%M:%S%.f", "%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    // XMP allows a zone without seconds or a bare date
    let wall = strip_zone(value);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(wall, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(wall, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn strip_zone(value: &str) -> &str {
    if let Some(stripped) = value.strip_suffix('Z') {
        return stripped;
    }
    // A zone only follows the time part
    if let Some(t) = value.find('T') {
        if let Some(pos) = value[t..].rfind(['+', '-']) {
            return &value[..t + pos];
        }
    }
    value
}

/// Parse an ISO 8601 / RFC 3339 timestamp; values without a zone are UTC
pub fn parse_iso8601(raw: &str) -> Option<DateTime<FixedOffset>> {
    let value = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    let utc = FixedOffset::east_opt(0)?;
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return utc.from_local_datetime(&dt).single();
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|dt| utc.from_local_datetime(&dt).single())
}

/// Parse a PDF date string `D:YYYYMMDDHHmmSSOHH'mm'`.
///
/// Every component after the year is optional and defaults to the start of
/// its range; a missing zone means UTC.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let value = raw.trim();
    let value = value.strip_prefix("D:").unwrap_or(value);

    let digits_end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let digits = &value[..digits_end];
    if digits.len() < 4 {
        return None;
    }

    let field = |start: usize, len: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + len) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = digits[..4].parse().ok()?;
    let month = field(4, 2, 1)?;
    let day = field(6, 2, 1)?;
    let hour = field(8, 2, 0)?;
    let minute = field(10, 2, 0)?;
    let second = field(12, 2, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_pdf_offset(&value[digits_end..]).unwrap_or(FixedOffset::east_opt(0)?);
    offset.from_local_datetime(&naive).single()
}

fn parse_pdf_offset(zone: &str) -> Option<FixedOffset> {
    let mut chars = zone.chars();
    let sign = match chars.next()? {
        'Z' | 'z' => return FixedOffset::east_opt(0),
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let rest: String = chars.filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = rest.get(0..2)?.parse().ok()?;
    let minutes: i32 = rest.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse an RFC 2822 mail date
pub fn parse_rfc2822(raw: &str) -> Option<DateTime<FixedOffset>> {
    let value = raw.trim();
    DateTime::parse_from_rfc2822(value).ok().or_else(|| {
        // trailing comments such as "(UTC)" are common in the wild
        let cut = value.find('(').map(|i| value[..i].trim()).unwrap_or(value);
        DateTime::parse_from_rfc2822(cut).ok()
    })
}

// =============================================================================
// Durations
// =============================================================================

/// Render the magnitude of a time delta in the coarsest fitting unit.
///
/// seconds < 60, minutes < 60, hours < 24, days < 7, weeks < 4,
/// months (30 days) < 12, otherwise years (365 days). Every step floors.
pub fn format_time_difference(delta: Duration) -> String {
    let seconds = delta.num_milliseconds().unsigned_abs() / 1000;
    if seconds < 60 {
        return format!("{seconds} seconds");
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes} minutes");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours} hrs");
    }

    let days = hours / 24;
    if days < 7 {
        return format!("{days} days");
    }

    let weeks = days / 7;
    if weeks < 4 {
        return format!("{weeks} weeks");
    }

    let months = days / 30;
    if months < 12 {
        return format!("{months} months");
    }

    format!("{} years", days / 365)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_exif_variants() {
        let dt = parse_exif_datetime("2021:03:04 10:11:12").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day(), dt.hour()), (2021, 3, 4, 10));

        let xmp = parse_exif_datetime("2021-03-04T10:11:12+01:00").unwrap();
        assert_eq!(xmp.hour(), 10);

        let xmp_short = parse_exif_datetime("2021-03-04T10:11-05:00").unwrap();
        assert_eq!(xmp_short.minute(), 11);

        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("").is_none());
    }

    #[test]
    fn test_parse_pdf_date_with_offset() {
        let dt = parse_pdf_date("D:20230115093000+02'00'").unwrap();
        assert_eq!(format_utc(&dt), "2023-01-15 07:30:00 UTC");

        let partial = parse_pdf_date("D:2023").unwrap();
        assert_eq!(format_utc(&partial), "2023-01-01 00:00:00 UTC");

        let zulu = parse_pdf_date("D:20230115093000Z").unwrap();
        assert_eq!(format_utc(&zulu), "2023-01-15 09:30:00 UTC");

        assert!(parse_pdf_date("garbage").is_none());
        assert!(parse_pdf_date("D:20231345").is_none());
    }

    #[test]
    fn test_parse_iso8601() {
        let a = parse_iso8601("2020-01-01T00:00:00Z").unwrap();
        let b = parse_iso8601("2020-01-01T00:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_iso8601("not a date").is_none());
    }

    #[test]
    fn test_parse_rfc2822_with_comment() {
        let dt = parse_rfc2822("Thu, 4 Mar 2021 10:11:12 +0000 (UTC)").unwrap();
        assert_eq!(format_utc(&dt), "2021-03-04 10:11:12 UTC");
    }

    #[test]
    fn test_time_difference_buckets() {
        assert_eq!(format_time_difference(Duration::seconds(59)), "59 seconds");
        assert_eq!(format_time_difference(Duration::seconds(-59)), "59 seconds");
        assert_eq!(format_time_difference(Duration::minutes(5)), "5 minutes");
        assert_eq!(format_time_difference(Duration::hours(3)), "3 hrs");
        assert_eq!(format_time_difference(Duration::days(6)), "6 days");
        assert_eq!(format_time_difference(Duration::days(21)), "3 weeks");
        // 28 days: 4 weeks is not < 4, so months (28 / 30 = 0)
        assert_eq!(format_time_difference(Duration::days(28)), "0 months");
        assert_eq!(format_time_difference(Duration::days(200)), "6 months");
        assert_eq!(format_time_difference(Duration::days(800)), "2 years");
    }
}
