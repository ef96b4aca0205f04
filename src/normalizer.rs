//! Timestamp normalization
//!
//! Converts freeform timestamp text into a canonical UTC instant by trying an
//! ordered list of parse strategies. The first strategy that produces an instant
//! wins; when none does the outcome is a typed [`ParseFailure`].
//!
//! Strategy order:
//! - dotted meridiem (`D-MON-YY H.MM.SS.ffff AM`), only in the pipeline variant
//! - native date-time expressions with an offset (ISO-8601 / RFC 3339 relaxed)
//! - explicit layout templates, zoned by a trailing offset token or UTC
//! - strict RFC 3339
//! - RFC 2822

use crate::types::{ParseFailure, ParseOutcome, ParsedTimestamp};
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc,
};

/// Two-digit years below this value land in the 2000s, the rest in the 1900s
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 50;

/// A single way of turning cleaned timestamp text into an instant
pub trait ParseStrategy: Send + Sync {
    /// Short name reported with successful parses
    fn name(&self) -> &'static str;

    /// Attempt to parse already-cleaned text
    fn parse(&self, text: &str) -> Option<DateTime<Utc>>;
}

/// Explicit layout template
#[derive(Debug, Clone, Copy)]
enum Layout {
    DateTime(&'static str),
    Date(&'static str),
}

impl Layout {
    fn format(&self) -> &'static str {
        match self {
            Layout::DateTime(format) | Layout::Date(format) => format,
        }
    }
}

/// Layout templates in match order. Two-digit-year layouts come before their
/// four-digit counterparts because `%Y` also accepts two digits.
const LAYOUTS: &[Layout] = &[
    // Day, month abbreviation, dotted or colon time with AM/PM
    Layout::DateTime("%d-%b-%y %I.%M.%S%.f %p"),
    Layout::DateTime("%d-%b-%y %I:%M:%S%.f %p"),
    Layout::DateTime("%d-%b-%y %I:%M %p"),
    Layout::DateTime("%d-%b-%Y %I.%M.%S%.f %p"),
    Layout::DateTime("%d-%b-%Y %I:%M:%S%.f %p"),
    Layout::DateTime("%d-%b-%Y %I:%M %p"),
    Layout::DateTime("%d-%b-%y %H:%M:%S%.f"),
    Layout::DateTime("%d-%b-%Y %H:%M:%S%.f"),
    // Slash-delimited numeric dates
    Layout::DateTime("%m/%d/%y %I:%M:%S %p"),
    Layout::DateTime("%m/%d/%y %H:%M:%S"),
    Layout::DateTime("%m/%d/%y %H:%M"),
    Layout::DateTime("%m/%d/%Y %I:%M:%S %p"),
    Layout::DateTime("%m/%d/%Y %H:%M:%S%.f"),
    Layout::DateTime("%m/%d/%Y %H:%M"),
    Layout::Date("%m/%d/%y"),
    Layout::Date("%m/%d/%Y"),
    // ISO date and time without offset
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%d %H:%M"),
    Layout::DateTime("%Y-%m-%dT%H:%M"),
    // ISO with a literal Z
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.fZ"),
    Layout::Date("%Y-%m-%d"),
];

/// Converts raw timestamp text into canonical UTC instants
pub struct TimestampNormalizer {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl Default for TimestampNormalizer {
    fn default() -> Self {
        Self::standard()
    }
}

impl TimestampNormalizer {
    /// Native, template, RFC 3339 and RFC 2822 strategies
    pub fn standard() -> Self {
        Self::from_strategies(standard_strategies())
    }

    /// Standard strategies preceded by the dotted meridiem pattern
    /// (`21-MAR-25 2.07.06.4343 AM`), as used by the classification pipeline
    pub fn with_dotted_meridiem() -> Self {
        let mut strategies: Vec<Box<dyn ParseStrategy>> = vec![Box::new(DottedMeridiemStrategy)];
        strategies.extend(standard_strategies());
        Self::from_strategies(strategies)
    }

    /// Build a normalizer from an explicit strategy list
    pub fn from_strategies(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in the order they are tried
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Normalize one raw timestamp field
    pub fn normalize(&self, raw: Option<&str>) -> ParseOutcome {
        let raw = raw.unwrap_or_default();
        if raw.trim().is_empty() {
            return Err(ParseFailure::EmptyInput);
        }

        let text = clean_text(raw);

        self.strategies
            .iter()
            .find_map(|strategy| {
                strategy.parse(&text).map(|instant| ParsedTimestamp {
                    instant,
                    strategy: strategy.name(),
                })
            })
            .ok_or(ParseFailure::UnparsableFormat)
    }
}

fn standard_strategies() -> Vec<Box<dyn ParseStrategy>> {
    vec![
        Box::new(NativeStrategy),
        Box::new(TemplateStrategy),
        Box::new(Rfc3339Strategy),
        Box::new(Rfc2822Strategy),
    ]
}

/// Collapse whitespace runs and rewrite a `GMT` token to `+0000`
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(|token| if token == "GMT" { "+0000" } else { token })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Date-time expressions that carry their own offset
pub struct NativeStrategy;

impl ParseStrategy for NativeStrategy {
    fn name(&self) -> &'static str {
        "native"
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        text.parse::<DateTime<FixedOffset>>()
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Explicit layout templates, zoned by a trailing offset token when present
pub struct TemplateStrategy;

impl ParseStrategy for TemplateStrategy {
    fn name(&self) -> &'static str {
        "template"
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let (body, offset) = split_offset(text);

        LAYOUTS.iter().find_map(|layout| {
            let naive = parse_layout(body, *layout)?;
            match offset {
                Some(offset) => offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc)),
                None => Some(naive.and_utc()),
            }
        })
    }
}

/// Strict RFC 3339
pub struct Rfc3339Strategy;

impl ParseStrategy for Rfc3339Strategy {
    fn name(&self) -> &'static str {
        "rfc3339"
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// RFC 2822 (`Tue, 1 Jul 2003 10:52:37 +0200`)
pub struct Rfc2822Strategy;

impl ParseStrategy for Rfc2822Strategy {
    fn name(&self) -> &'static str {
        "rfc2822"
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc2822(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// `D-MON-YY H.MM.SS.ffff AM|PM`: dots in the time are rewritten to colons and
/// the result is handed to the layout templates
pub struct DottedMeridiemStrategy;

impl ParseStrategy for DottedMeridiemStrategy {
    fn name(&self) -> &'static str {
        "dotted_meridiem"
    }

    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let rewritten = rewrite_dotted_meridiem(text)?;
        TemplateStrategy.parse(&rewritten)
    }
}

/// Returns the colon-separated form when `text` has the dotted meridiem shape
fn rewrite_dotted_meridiem(text: &str) -> Option<String> {
    let parts: Vec<&str> = text.split(' ').collect();
    let [date, time, meridiem] = parts.as_slice() else {
        return None;
    };

    let date_parts: Vec<&str> = date.split('-').collect();
    let [day, month, year] = date_parts.as_slice() else {
        return None;
    };
    let date_ok = is_digits(day, 1, 2)
        && month.len() == 3
        && month.chars().all(|c| c.is_ascii_alphabetic())
        && is_digits(year, 2, 2);

    let time_parts: Vec<&str> = time.split('.').collect();
    let [hour, minute, second, fraction] = time_parts.as_slice() else {
        return None;
    };
    let time_ok = is_digits(hour, 1, 2)
        && is_digits(minute, 2, 2)
        && is_digits(second, 2, 2)
        && is_digits(fraction, 1, 9);

    let meridiem_ok = meridiem.eq_ignore_ascii_case("AM") || meridiem.eq_ignore_ascii_case("PM");

    if !(date_ok && time_ok && meridiem_ok) {
        return None;
    }

    Some(format!(
        "{} {}:{}:{}.{} {}",
        date, hour, minute, second, fraction, meridiem
    ))
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Split a trailing offset token (`+0530`, `-05:00`, `Z`, `UTC`) from the text
fn split_offset(text: &str) -> (&str, Option<FixedOffset>) {
    match text.rsplit_once(' ') {
        Some((body, token)) => match parse_offset_token(token) {
            Some(offset) => (body, Some(offset)),
            None => (text, None),
        },
        None => (text, None),
    }
}

fn parse_offset_token(token: &str) -> Option<FixedOffset> {
    if token == "Z" || token == "UTC" {
        return FixedOffset::east_opt(0);
    }

    let sign = match token.chars().next()? {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let digits: String = token[1..].chars().filter(|c| *c != ':').collect();
    if !is_digits(&digits, 4, 4) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_layout(body: &str, layout: Layout) -> Option<NaiveDateTime> {
    let naive = match layout {
        Layout::DateTime(format) => NaiveDateTime::parse_from_str(body, format).ok()?,
        Layout::Date(format) => NaiveDate::parse_from_str(body, format)
            .ok()?
            .and_hms_opt(0, 0, 0)?,
    };

    if layout.format().contains("%y") {
        apply_year_pivot(naive)
    } else {
        Some(naive)
    }
}

/// chrono maps `%y` 00-69 to 2000-2069; shift 50-69 back into the 1900s
fn apply_year_pivot(naive: NaiveDateTime) -> Option<NaiveDateTime> {
    let year = naive.year();
    if (2000 + TWO_DIGIT_YEAR_PIVOT..2070).contains(&year) {
        naive.with_year(year - 100)
    } else {
        Some(naive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let normalizer = TimestampNormalizer::with_dotted_meridiem();

        assert_eq!(normalizer.normalize(None), Err(ParseFailure::EmptyInput));
        assert_eq!(normalizer.normalize(Some("")), Err(ParseFailure::EmptyInput));
        assert_eq!(normalizer.normalize(Some("   ")), Err(ParseFailure::EmptyInput));
        assert_eq!(normalizer.normalize(Some("\t\n")), Err(ParseFailure::EmptyInput));
    }

    #[test]
    fn test_unparsable() {
        let normalizer = TimestampNormalizer::with_dotted_meridiem();

        assert_eq!(
            normalizer.normalize(Some("not a date")),
            Err(ParseFailure::UnparsableFormat)
        );
        assert_eq!(
            normalizer.normalize(Some("2024-13-45 99:99")),
            Err(ParseFailure::UnparsableFormat)
        );
    }

    #[test]
    fn test_dotted_meridiem_pattern() {
        let normalizer = TimestampNormalizer::with_dotted_meridiem();
        let parsed = normalizer.normalize(Some("21-MAR-25 2.07.06.4343 AM")).unwrap();

        assert_eq!(parsed.strategy, "dotted_meridiem");
        assert_eq!(parsed.instant.with_nanosecond(0).unwrap(), utc(2025, 3, 21, 2, 7, 6));
        assert_eq!(parsed.instant.nanosecond(), 434_300_000);
        assert_eq!(parsed.canonical(), "2025-03-21T02:07:06.434Z");
    }

    #[test]
    fn test_dotted_meridiem_pm_and_pivot() {
        let normalizer = TimestampNormalizer::with_dotted_meridiem();

        let parsed = normalizer.normalize(Some("05-Nov-49 11.30.00.1 PM")).unwrap();
        assert_eq!(parsed.instant.with_nanosecond(0).unwrap(), utc(2049, 11, 5, 23, 30, 0));

        let parsed = normalizer.normalize(Some("05-Nov-50 11.30.00.1 PM")).unwrap();
        assert_eq!(parsed.instant.with_nanosecond(0).unwrap(), utc(1950, 11, 5, 23, 30, 0));

        let parsed = normalizer.normalize(Some("01-jan-75 12.00.00.0 AM")).unwrap();
        assert_eq!(parsed.instant, utc(1975, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_dotted_shape_rejects_other_text() {
        assert!(rewrite_dotted_meridiem("21-MAR-25 2:07:06 AM").is_none());
        assert!(rewrite_dotted_meridiem("21-MAR-2025 2.07.06.4343 AM").is_none());
        assert!(rewrite_dotted_meridiem("21-MAR-25 2.07.06.4343").is_none());
        assert_eq!(
            rewrite_dotted_meridiem("21-MAR-25 2.07.06.4343 AM").as_deref(),
            Some("21-MAR-25 2:07:06.4343 AM")
        );
    }

    #[test]
    fn test_standard_normalizer_parses_dotted_via_templates() {
        let normalizer = TimestampNormalizer::standard();
        let parsed = normalizer.normalize(Some("21-MAR-25 2.07.06.4343 AM")).unwrap();

        assert_eq!(parsed.strategy, "template");
        assert_eq!(parsed.instant.with_nanosecond(0).unwrap(), utc(2025, 3, 21, 2, 7, 6));
    }

    #[test]
    fn test_iso_with_offset() {
        let normalizer = TimestampNormalizer::standard();
        let parsed = normalizer.normalize(Some("2024-01-15T08:30:00+05:30")).unwrap();

        assert_eq!(parsed.instant, utc(2024, 1, 15, 3, 0, 0));
    }

    #[test]
    fn test_iso_zulu() {
        let normalizer = TimestampNormalizer::standard();
        let parsed = normalizer.normalize(Some("2024-03-29T00:26:00.000Z")).unwrap();

        assert_eq!(parsed.instant, utc(2024, 3, 29, 0, 26, 0));
    }

    #[test]
    fn test_template_with_trailing_offset() {
        let normalizer = TimestampNormalizer::standard();

        let parsed = normalizer.normalize(Some("21-Mar-25 02:07:06 PM -0200")).unwrap();
        assert_eq!(parsed.instant, utc(2025, 3, 21, 16, 7, 6));

        let parsed = normalizer.normalize(Some("03/21/2025 14:05 +01:00")).unwrap();
        assert_eq!(parsed.instant, utc(2025, 3, 21, 13, 5, 0));
    }

    #[test]
    fn test_gmt_token_rewrite() {
        let normalizer = TimestampNormalizer::standard();

        let parsed = normalizer.normalize(Some("Tue, 1 Jul 2003 10:52:37 GMT")).unwrap();
        assert_eq!(parsed.strategy, "rfc2822");
        assert_eq!(parsed.instant, utc(2003, 7, 1, 10, 52, 37));

        let parsed = normalizer.normalize(Some("21-Mar-2025 09:15:00 GMT")).unwrap();
        assert_eq!(parsed.instant, utc(2025, 3, 21, 9, 15, 0));
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let normalizer = TimestampNormalizer::standard();
        let parsed = normalizer.normalize(Some("  2024-01-15    08:30:00 ")).unwrap();

        assert_eq!(parsed.strategy, "template");
        assert_eq!(parsed.instant, utc(2024, 1, 15, 8, 30, 0));
        assert_eq!(clean_text("  a \t b\n GMT "), "a b +0000");
    }

    #[test]
    fn test_slash_dates() {
        let normalizer = TimestampNormalizer::standard();

        let parsed = normalizer.normalize(Some("03/21/2025 14:05")).unwrap();
        assert_eq!(parsed.instant, utc(2025, 3, 21, 14, 5, 0));

        let parsed = normalizer.normalize(Some("03/21/25 14:05")).unwrap();
        assert_eq!(parsed.instant, utc(2025, 3, 21, 14, 5, 0));

        let parsed = normalizer.normalize(Some("12/31/2023")).unwrap();
        assert_eq!(parsed.instant, utc(2023, 12, 31, 0, 0, 0));

        let parsed = normalizer.normalize(Some("07/04/2024 09:05:30 PM")).unwrap();
        assert_eq!(parsed.instant, utc(2024, 7, 4, 21, 5, 30));
    }

    #[test]
    fn test_templates_reproduce_wall_clock_fields() {
        let normalizer = TimestampNormalizer::with_dotted_meridiem();
        // One sample per entry of LAYOUTS, in the same order
        let samples = [
            "21-Mar-25 02.07.06.434 AM",
            "09-Dec-87 11:59:30.500 PM",
            "01-Feb-03 07:30 AM",
            "21-Mar-2025 02.07.06.125 PM",
            "05-Jan-2024 11:15:00 PM",
            "05-Jan-2024 11:15 PM",
            "17-Aug-22 04:20:00",
            "17-Aug-2022 16:20:00.250",
            "07/04/24 09:05:30 PM",
            "12/31/99 23:59:59",
            "07/04/24 09:05",
            "01/02/2024 03:04:05 AM",
            "12/31/2023 07:45:12.500",
            "12/31/2023 07:45",
            "02/29/24",
            "11/30/2023",
            "2024-02-29 23:59:58.125",
            "2024-06-01T07:00:01.750",
            "2023-10-05 18:45",
            "2023-10-05T18:45",
            "2024-06-01T07:00:01.250Z",
            "2024-01-31",
        ];
        assert_eq!(samples.len(), LAYOUTS.len());

        for (layout, text) in LAYOUTS.iter().zip(samples) {
            let format = layout.format();
            assert!(parse_layout(text, *layout).is_some(), "sample for {} must match it", format);

            let parsed = normalizer.normalize(Some(text)).unwrap();
            assert_eq!(parsed.instant.format(format).to_string(), text, "layout {}", format);
        }
    }

    #[test]
    fn test_offset_tokens() {
        assert_eq!(parse_offset_token("+0530"), FixedOffset::east_opt(19_800));
        assert_eq!(parse_offset_token("-05:00"), FixedOffset::east_opt(-18_000));
        assert_eq!(parse_offset_token("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset_token("+2500"), None);
        assert_eq!(parse_offset_token("PM"), None);
        assert_eq!(parse_offset_token("-"), None);
    }

    #[test]
    fn test_strategy_order() {
        assert_eq!(
            TimestampNormalizer::with_dotted_meridiem().strategy_names(),
            vec!["dotted_meridiem", "native", "template", "rfc3339", "rfc2822"]
        );
        assert_eq!(
            TimestampNormalizer::standard().strategy_names(),
            vec!["native", "template", "rfc3339", "rfc2822"]
        );
    }
}
