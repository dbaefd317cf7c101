//! Timestamp parsing and canonical formatting.
//!
//! # Responsibility
//! - Produce the canonical text form written to `created_at`/`updated_at`.
//! - Normalize persisted timestamp text for display.
//!
//! # Invariants
//! - Canonical form is `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`; lexical order of
//!   canonical strings equals chronological order.
//! - `normalize_timestamp` never fails. Unparseable input yields the current
//!   time and a `timestamp_fallback` warning, which can hide corrupted rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use log::warn;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y%m%dT%H%M%S%.f%:z",
    "%Y%m%dT%H%M%:z",
];
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S%.f",
    "%Y%m%dT%H%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];
const MAX_LOGGED_CHARS: usize = 64;

/// Current UTC time in canonical text form.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Formats a UTC instant in canonical text form.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Strictly parses ISO-8601 text into a UTC instant.
///
/// Accepts extended (`2024-03-05T07:08:09`) and basic (`20240305T070809`)
/// forms, a `T` or space separator, minute or second precision, `.` or `,`
/// fractions, and offsets written `Z`, `±HH`, `±HHMM` or `±HH:MM`. A missing
/// offset is assumed UTC, a bare date means midnight UTC, and other offsets
/// are converted. Hour-only times, week dates and ordinal dates are rejected.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = prepare_input(raw)?;

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(&text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(parsed.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Rewrites `Z`, comma fractions and `±HH` offsets into shapes the format
/// tables accept.
fn prepare_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut text = match trimmed.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+00:00"),
        None => trimmed.to_string(),
    };
    if text.contains(',') {
        text = text.replace(',', ".");
    }

    if let Some(separator) = text.find(['T', ' ']) {
        let time = text[separator + 1..].as_bytes();
        let len = time.len();
        if len >= 4
            && time[len - 4].is_ascii_digit()
            && matches!(time[len - 3], b'+' | b'-')
            && time[len - 2].is_ascii_digit()
            && time[len - 1].is_ascii_digit()
        {
            text.push_str(":00");
        }
    }
    Some(text)
}

/// Normalizes persisted timestamp text to canonical UTC form.
///
/// Falls back to the current time when `raw` cannot be parsed.
pub fn normalize_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(parsed) => format_timestamp(parsed),
        None => {
            let shown: String = raw.chars().take(MAX_LOGGED_CHARS).collect();
            warn!(
                "event=timestamp_fallback module=model status=degraded raw={:?}",
                shown
            );
            now_timestamp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{format_timestamp, normalize_timestamp, now_timestamp, parse_timestamp};
    use chrono::{TimeZone, Utc};

    #[test]
    fn canonical_format_has_micros_and_explicit_offset() {
        let value = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(value), "2024-03-05T07:08:09.000000+00:00");
    }

    #[test]
    fn trailing_z_is_treated_as_utc() {
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08:09Z"),
            "2024-03-05T07:08:09.000000+00:00"
        );
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08:09.25Z"),
            "2024-03-05T07:08:09.250000+00:00"
        );
    }

    #[test]
    fn missing_offset_is_assumed_utc() {
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08:09.123456"),
            "2024-03-05T07:08:09.123456+00:00"
        );
        // SQLite `datetime('now')` shape.
        assert_eq!(
            normalize_timestamp("2024-03-05 07:08:09"),
            "2024-03-05T07:08:09.000000+00:00"
        );
    }

    #[test]
    fn date_only_means_midnight() {
        assert_eq!(
            normalize_timestamp("2024-03-05"),
            "2024-03-05T00:00:00.000000+00:00"
        );
    }

    #[test]
    fn non_utc_offsets_are_converted() {
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08:09+02:00"),
            "2024-03-05T05:08:09.000000+00:00"
        );
    }

    #[test]
    fn minute_precision_accepts_an_offset() {
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08+02:00"),
            "2024-03-05T05:08:00.000000+00:00"
        );
        assert_eq!(
            normalize_timestamp("2024-03-05 07:08Z"),
            "2024-03-05T07:08:00.000000+00:00"
        );
    }

    #[test]
    fn offset_spellings_are_equivalent() {
        let expected = "2024-03-05T05:08:09.000000+00:00";
        assert_eq!(normalize_timestamp("2024-03-05T07:08:09+02:00"), expected);
        assert_eq!(normalize_timestamp("2024-03-05T07:08:09+0200"), expected);
        assert_eq!(normalize_timestamp("2024-03-05T07:08:09+02"), expected);
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08-05"),
            "2024-03-05T12:08:00.000000+00:00"
        );
    }

    #[test]
    fn basic_format_is_accepted() {
        assert_eq!(
            normalize_timestamp("20240305T070809Z"),
            "2024-03-05T07:08:09.000000+00:00"
        );
        assert_eq!(
            normalize_timestamp("20240305T070809.5+0100"),
            "2024-03-05T06:08:09.500000+00:00"
        );
        assert_eq!(
            normalize_timestamp("20240305T0708"),
            "2024-03-05T07:08:00.000000+00:00"
        );
        assert_eq!(
            normalize_timestamp("20240305"),
            "2024-03-05T00:00:00.000000+00:00"
        );
    }

    #[test]
    fn comma_decimal_fraction_is_accepted() {
        assert_eq!(
            normalize_timestamp("2024-03-05T07:08:09,5Z"),
            "2024-03-05T07:08:09.500000+00:00"
        );
    }

    #[test]
    fn unsupported_shapes_are_rejected() {
        for raw in [
            "2024-03-05T07",
            "2024-W10-2",
            "2024-065",
            "2024-13-01T00:00:00",
            "2024-03-05T25:00:00Z",
            "yesterday",
        ] {
            assert!(parse_timestamp(raw).is_none(), "{raw} should not parse");
        }
    }

    #[test]
    fn canonical_text_is_stable_under_normalization() {
        let now = now_timestamp();
        assert_eq!(normalize_timestamp(&now), now);
    }

    #[test]
    fn malformed_input_falls_back_to_now() {
        assert!(parse_timestamp("not a timestamp").is_none());
        assert!(parse_timestamp("").is_none());

        let before = Utc::now();
        let normalized = normalize_timestamp("not a timestamp");
        let after = Utc::now();

        let parsed = parse_timestamp(&normalized).unwrap();
        // Canonical text keeps microseconds, so allow truncation below `before`.
        assert!(parsed >= before - chrono::Duration::milliseconds(1));
        assert!(parsed <= after);
    }
}
