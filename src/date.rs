//! Date normalization module
//!
//! Turns the loosely formatted publish dates found in page markup and archive
//! headers into absolute UTC timestamps, and renders them back out as ISO 8601
//! strings or PDF date strings.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;

/// Trailing zone abbreviation (US zones, UTC/GMT or a bare `Z`), optionally in parentheses
#[allow(clippy::expect_used)]
static ZONE_ABBREVIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)[\s(]+(UTC|GMT|Z|EST|EDT|CST|CDT|MST|MDT|PST|PDT)\)?$")
        .expect("valid regex")
});

/// Formats carrying a numeric offset
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
    "%d %B %Y %H:%M:%S %z",
    "%B %d, %Y %H:%M:%S %z",
];

/// Date and time without an offset (taken as UTC)
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y %H:%M",
    "%B %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y at %I:%M %p",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y %H:%M",
];

/// Date only (midnight UTC)
const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%d %B, %Y",
    "%Y%m%d",
];

/// Offset in seconds east of UTC for the abbreviations archives commonly carry
fn zone_offset_seconds(abbreviation: &str) -> Option<i32> {
    let hours = match abbreviation.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    Some(hours * 3600)
}

/// Normalize a loosely formatted date string to an absolute UTC timestamp
///
/// Supported inputs include:
/// - `"2024-01-02T10:00:00Z"`, `"2024-01-02T10:00:00.5+05:30"` (ISO 8601 / RFC 3339)
/// - `"Tue, 02 Jan 2024 10:00:00 -0500"` (RFC 2822, as in MIME `Date:` headers)
/// - `"2024-01-02 10:00:00 EST"`, `"January 2, 2024 3:04 PM (PDT)"`
/// - `"01/02/2024"`, `"2 January 2024"`, `"Tuesday, January 2, 2024"`, `"20240102"`
///
/// Timestamps without an offset are taken as UTC; bare dates become midnight UTC.
/// Anything unparseable yields `None`.
pub fn normalize_date(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(caps) = ZONE_ABBREVIATION_RE.captures(&text) {
        if let Some(dt) = parse_with_zone(&caps[1], &caps[2]) {
            return Some(dt);
        }
    }

    // Trailing "Z" on forms RFC 3339 rejects, e.g. minutes-only precision
    if let Some(body) = text.strip_suffix(['Z', 'z']) {
        if body.ends_with(|c: char| c.is_ascii_digit()) {
            if let Some(naive) = parse_naive(body) {
                return Some(naive.and_utc());
            }
        }
    }

    let text = strip_weekday(&text);
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    parse_naive(text).map(|naive| naive.and_utc())
}

/// Parse `body` followed by a zone abbreviation
///
/// A numeric offset inside `body` wins over the abbreviation; otherwise
/// `body` is local time in the named zone.
fn parse_with_zone(body: &str, zone: &str) -> Option<DateTime<Utc>> {
    let body = strip_weekday(body.trim());
    if let Ok(dt) = DateTime::parse_from_rfc3339(body) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(body, format).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    let offset = zone_offset_seconds(zone).and_then(FixedOffset::east_opt)?;
    parse_naive(body)?
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a date or date-time that carries no offset
fn parse_naive(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive);
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Drop a leading weekday name such as "Tuesday," or "Tue"
fn strip_weekday(text: &str) -> &str {
    const WEEKDAYS: &[&str] = &[
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        "mon", "tue", "tues", "wed", "thu", "thur", "thurs", "fri", "sat", "sun",
    ];

    let Some((first, rest)) = text.split_once(' ') else {
        return text;
    };
    let word = first.trim_end_matches(',').to_lowercase();
    if WEEKDAYS.contains(&word.as_str()) {
        rest.trim_start()
    } else {
        text
    }
}

/// Render a timestamp as ISO 8601 with an explicit `+00:00` offset
///
/// Fractional seconds are only written when nonzero.
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parse an ISO 8601 timestamp as produced by [`to_iso`] (a trailing `Z` is accepted)
pub fn parse_iso(iso: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(iso.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp in PDF date syntax: `D:YYYYMMDDHHmmSS+00'00'`
pub fn to_pdf_date(dt: &DateTime<Utc>) -> String {
    dt.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_empty_and_garbage() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("   \n\t"), None);
        assert_eq!(normalize_date("not a date"), None);
        assert_eq!(normalize_date("2024-13-40"), None);
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(
            normalize_date("2024-01-02T10:00:00Z"),
            Some(utc(2024, 1, 2, 10, 0, 0))
        );
        assert_eq!(
            normalize_date("2024-01-02T10:00:00+05:30"),
            Some(utc(2024, 1, 2, 4, 30, 0))
        );
        assert_eq!(
            normalize_date("  2024-01-02T10:00:00-04:00 "),
            Some(utc(2024, 1, 2, 14, 0, 0))
        );
    }

    #[test]
    fn test_minute_precision_with_offsets() {
        assert_eq!(
            normalize_date("2024-01-02T10:00Z"),
            Some(utc(2024, 1, 2, 10, 0, 0))
        );
        assert_eq!(
            normalize_date("2024-01-02T10:00+0200"),
            Some(utc(2024, 1, 2, 8, 0, 0))
        );
    }

    #[test]
    fn test_compact_offset() {
        assert_eq!(
            normalize_date("2024-01-02T10:00:00+0100"),
            Some(utc(2024, 1, 2, 9, 0, 0))
        );
    }

    #[test]
    fn test_rfc2822_header_dates() {
        assert_eq!(
            normalize_date("Tue, 02 Jan 2024 10:00:00 -0500"),
            Some(utc(2024, 1, 2, 15, 0, 0))
        );
        assert_eq!(
            normalize_date("Tue, 2 Jan 2024 10:00:00 EST"),
            Some(utc(2024, 1, 2, 15, 0, 0))
        );
    }

    #[test]
    fn test_us_zone_abbreviations() {
        let cases = [
            ("2024-07-04 12:00:00 EDT", 16),
            ("2024-07-04 12:00:00 CST", 18),
            ("2024-07-04 12:00:00 CDT", 17),
            ("2024-07-04 12:00:00 MST", 19),
            ("2024-07-04 12:00:00 MDT", 18),
            ("2024-07-04 12:00:00 PST", 20),
            ("2024-07-04 12:00:00 PDT", 19),
            ("2024-07-04 12:00:00 GMT", 12),
            ("2024-07-04 12:00:00 utc", 12),
        ];
        for (input, hour) in cases {
            assert_eq!(
                normalize_date(input),
                Some(utc(2024, 7, 4, hour, 0, 0)),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_bare_z_zone_token() {
        assert_eq!(
            normalize_date("2024-01-02 10:00:00 Z"),
            Some(utc(2024, 1, 2, 10, 0, 0))
        );
        assert_eq!(
            normalize_date("January 2, 2024 (z)"),
            Some(utc(2024, 1, 2, 0, 0, 0))
        );
    }

    #[test]
    fn test_offset_followed_by_zone_name() {
        assert_eq!(
            normalize_date("2024-01-02T10:00:00-05:00 EST"),
            Some(utc(2024, 1, 2, 15, 0, 0))
        );
        // The numeric offset wins over a contradicting abbreviation
        assert_eq!(
            normalize_date("2024-01-02 10:00:00 +0100 (PST)"),
            Some(utc(2024, 1, 2, 9, 0, 0))
        );
    }

    #[test]
    fn test_unparseable_body_before_zone() {
        assert_eq!(normalize_date("sometime EST"), None);
        assert_eq!(normalize_date("soon Z"), None);
    }

    #[test]
    fn test_parenthesized_zone_and_twelve_hour_clock() {
        assert_eq!(
            normalize_date("January 2, 2024 3:04 PM (PST)"),
            Some(utc(2024, 1, 2, 23, 4, 0))
        );
    }

    #[test]
    fn test_naive_values_are_utc() {
        assert_eq!(
            normalize_date("2024-01-02 10:00:00"),
            Some(utc(2024, 1, 2, 10, 0, 0))
        );
        assert_eq!(
            normalize_date("2024-01-02T10:00:00.250"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
                + chrono::Duration::milliseconds(250))
        );
    }

    #[test]
    fn test_date_only_forms() {
        let expected = Some(utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(normalize_date("2024-01-02"), expected);
        assert_eq!(normalize_date("2024/01/02"), expected);
        assert_eq!(normalize_date("01/02/2024"), expected);
        assert_eq!(normalize_date("January 2, 2024"), expected);
        assert_eq!(normalize_date("Jan 2, 2024"), expected);
        assert_eq!(normalize_date("2 January 2024"), expected);
        assert_eq!(normalize_date("Tuesday, January 2, 2024"), expected);
        assert_eq!(normalize_date("20240102"), expected);
    }

    #[test]
    fn test_to_iso() {
        assert_eq!(to_iso(&utc(2024, 1, 2, 15, 0, 0)), "2024-01-02T15:00:00+00:00");
        let fractional = utc(2024, 1, 2, 15, 0, 0) + chrono::Duration::milliseconds(500);
        assert_eq!(to_iso(&fractional), "2024-01-02T15:00:00.500+00:00");
    }

    #[test]
    fn test_parse_iso_round_trip_and_z() {
        let dt = utc(2023, 11, 20, 8, 30, 15);
        assert_eq!(parse_iso(&to_iso(&dt)), Some(dt));
        assert_eq!(parse_iso("2023-11-20T08:30:15Z"), Some(dt));
        assert_eq!(parse_iso("yesterday"), None);
    }

    #[test]
    fn test_to_pdf_date() {
        assert_eq!(to_pdf_date(&utc(2024, 1, 2, 15, 4, 5)), "D:20240102150405+00'00'");
    }
}
