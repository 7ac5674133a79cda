// loglens - core/timestamp.rs
//
// Leading-timestamp recognition. A fixed set of forms is tried in order on
// the first 60 bytes of a line; the first match wins. Best-effort only:
// the function never returns an error, it either produces a timestamp or
// returns `None`. Calendar-invalid dates (e.g. Feb 30) yield `None`.

use crate::util::constants::TIMESTAMP_SCAN_PREFIX_BYTES;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// A recognised timestamp: epoch milliseconds plus the literal substring
/// that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTimestamp {
    pub epoch_ms: i64,
    pub literal: String,
}

/// Scan the first 60 bytes of `line` for a recognised timestamp form.
///
/// Forms, in priority order:
///   - ISO: `YYYY-MM-DD[T ]HH:MM:SS` with optional `.fff` and `Z`
///   - European: `DD.MM.YYYY HH:MM:SS`
///   - Syslog: `Mmm D HH:MM:SS` (year taken from the current clock;
///     month names matched case-sensitively)
pub fn parse_leading_timestamp(line: &str) -> Option<ParsedTimestamp> {
    struct Sniffer {
        re: Regex,
        parse: fn(&regex::Captures<'_>) -> Option<i64>,
    }

    static SNIFFERS: OnceLock<Vec<Sniffer>> = OnceLock::new();

    let sniffers = SNIFFERS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("parse_leading_timestamp: invalid regex")
        }

        vec![
            // ISO: 2024-01-15T14:30:22.123Z / 2024-01-15 14:30:22
            Sniffer {
                re: re(
                    r"(\d{4})-(\d{2})-(\d{2})[T ](\d{2}):(\d{2}):(\d{2})(?:\.(\d{1,3}))?Z?",
                ),
                parse: |caps| {
                    let millis = caps
                        .get(7)
                        .map(|m| pad_millis(m.as_str()))
                        .unwrap_or(0);
                    epoch_ms(
                        num(caps, 1)?,
                        num(caps, 2)? as u32,
                        num(caps, 3)? as u32,
                        num(caps, 4)? as u32,
                        num(caps, 5)? as u32,
                        num(caps, 6)? as u32,
                        millis,
                    )
                },
            },
            // European: 15.01.2024 14:30:22
            Sniffer {
                re: re(r"(\d{2})\.(\d{2})\.(\d{4}) (\d{2}):(\d{2}):(\d{2})"),
                parse: |caps| {
                    epoch_ms(
                        num(caps, 3)?,
                        num(caps, 2)? as u32,
                        num(caps, 1)? as u32,
                        num(caps, 4)? as u32,
                        num(caps, 5)? as u32,
                        num(caps, 6)? as u32,
                        0,
                    )
                },
            },
            // Syslog: Jan 15 14:30:22 (year-less; completed from the clock)
            Sniffer {
                re: re(
                    r"(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) {1,2}(\d{1,2}) (\d{2}):(\d{2}):(\d{2})",
                ),
                parse: |caps| {
                    let month = month_number(caps.get(1)?.as_str())?;
                    epoch_ms(
                        Utc::now().year(),
                        month,
                        num(caps, 2)? as u32,
                        num(caps, 3)? as u32,
                        num(caps, 4)? as u32,
                        num(caps, 5)? as u32,
                        0,
                    )
                },
            },
        ]
    });

    let prefix = byte_prefix(line, TIMESTAMP_SCAN_PREFIX_BYTES);
    for sniffer in sniffers {
        if let Some(caps) = sniffer.re.captures(prefix) {
            if let Some(epoch_ms) = (sniffer.parse)(&caps) {
                return Some(ParsedTimestamp {
                    epoch_ms,
                    literal: caps.get(0).map(|m| m.as_str().to_string())?,
                });
            }
            // Regex matched but the date is calendar-invalid (Feb 30):
            // no later, looser form may claim the same text.
            return None;
        }
    }
    None
}

/// Clamp `text` to at most `max` bytes on a char boundary.
pub(crate) fn byte_prefix(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn num(caps: &regex::Captures<'_>, i: usize) -> Option<i32> {
    caps.get(i)?.as_str().parse().ok()
}

/// `.5` means 500 ms, `.12` means 120 ms.
fn pad_millis(digits: &str) -> u32 {
    let mut value: u32 = digits.parse().unwrap_or(0);
    for _ in digits.len()..3 {
        value *= 10;
    }
    value
}

fn month_number(name: &str) -> Option<u32> {
    match name {
        "Jan" => Some(1),
        "Feb" => Some(2),
        "Mar" => Some(3),
        "Apr" => Some(4),
        "May" => Some(5),
        "Jun" => Some(6),
        "Jul" => Some(7),
        "Aug" => Some(8),
        "Sep" => Some(9),
        "Oct" => Some(10),
        "Nov" => Some(11),
        "Dec" => Some(12),
        _ => None,
    }
}

fn epoch_ms(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    millis: u32,
) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = date.and_hms_milli_opt(hour, minute, second, millis)?;
    Some(Utc.from_utc_datetime(&time).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_with_millis_and_zulu() {
        let ts = parse_leading_timestamp("2024-01-15T14:30:22.123Z error in pump").unwrap();
        assert_eq!(ts.literal, "2024-01-15T14:30:22.123Z");
        assert_eq!(ts.epoch_ms % 1000, 123);
    }

    #[test]
    fn test_iso_space_separator() {
        let ts = parse_leading_timestamp("2024-01-15 14:30:22 info").unwrap();
        assert_eq!(ts.literal, "2024-01-15 14:30:22");
    }

    #[test]
    fn test_european_form() {
        let ts = parse_leading_timestamp("15.01.2024 14:30:22 started").unwrap();
        assert_eq!(ts.literal, "15.01.2024 14:30:22");
        // Same instant as the ISO equivalent.
        let iso = parse_leading_timestamp("2024-01-15 14:30:22 x").unwrap();
        assert_eq!(ts.epoch_ms, iso.epoch_ms);
    }

    #[test]
    fn test_syslog_form_uses_current_year() {
        let ts = parse_leading_timestamp("Mar  5 04:12:33 host kernel: up").unwrap();
        assert_eq!(ts.literal, "Mar  5 04:12:33");
        let year = chrono::DateTime::from_timestamp_millis(ts.epoch_ms)
            .unwrap()
            .year();
        assert_eq!(year, Utc::now().year());
    }

    #[test]
    fn test_syslog_month_case_sensitive() {
        assert!(parse_leading_timestamp("mar  5 04:12:33 host").is_none());
    }

    #[test]
    fn test_invalid_calendar_date_yields_none() {
        assert!(parse_leading_timestamp("2024-02-30 10:00:00 impossible").is_none());
        assert!(parse_leading_timestamp("30.02.2024 10:00:00 impossible").is_none());
    }

    #[test]
    fn test_timestamp_outside_prefix_window_ignored() {
        let line = format!("{}2024-01-15 14:30:22", " ".repeat(70));
        assert!(parse_leading_timestamp(&line).is_none());
    }

    #[test]
    fn test_no_timestamp() {
        assert!(parse_leading_timestamp("plain message without a date").is_none());
    }

    #[test]
    fn test_prefix_clamp_respects_char_boundaries() {
        let line = "ééééééééééééééééééééééééééééééééééééééééé";
        // Must not panic on a non-boundary clamp.
        let _ = parse_leading_timestamp(line);
        assert!(byte_prefix(line, 3).len() <= 3);
    }
}
