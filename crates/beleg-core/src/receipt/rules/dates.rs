//! Date extraction for German receipts.

use chrono::NaiveDate;
use regex::Regex;

use super::patterns::{DATE_DMY, DATE_DMY_SHORT, DATE_ISO, DATE_NAMED, DATE_SLASH};
use super::{ExtractionMatch, FieldExtractor};

/// Field order of a date pattern's three capture groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldOrder {
    DayMonthYear,
    YearMonthDay,
}

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }

    fn patterns() -> [(&'static Regex, FieldOrder); 5] {
        [
            (&*DATE_DMY, FieldOrder::DayMonthYear),
            (&*DATE_DMY_SHORT, FieldOrder::DayMonthYear),
            (&*DATE_ISO, FieldOrder::YearMonthDay),
            (&*DATE_SLASH, FieldOrder::DayMonthYear),
            (&*DATE_NAMED, FieldOrder::DayMonthYear),
        ]
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    /// First valid date of the first pattern that yields one.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    /// All valid dates, grouped by pattern in priority order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        for (pattern, order) in Self::patterns() {
            for caps in pattern.captures_iter(text) {
                let (year, month, day) = match order {
                    FieldOrder::DayMonthYear => (&caps[3], &caps[2], &caps[1]),
                    FieldOrder::YearMonthDay => (&caps[1], &caps[2], &caps[3]),
                };

                let Some(date) = build_date(year, month, day) else {
                    continue;
                };
                if results.iter().any(|r| r.value == date) {
                    continue;
                }

                if let Some(m) = caps.get(0) {
                    results.push(
                        ExtractionMatch::new(date, 0.9, m.as_str()).with_position(m.start(), m.end()),
                    );
                }
            }
        }

        results
    }
}

/// First date in the text, or `None`.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(text).map(|m| m.value)
}

/// Parse a date as a model would return it: ISO first, then the
/// German/European forms.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    extract_date(s)
}

fn build_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year = parse_year(year)?;
    let month = match month.parse::<u32>() {
        Ok(m) => m,
        Err(_) => month_from_name(month)?,
    };
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Two-digit years below 50 are 20xx, the rest 19xx.
fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    Some(match year {
        0..=49 => 2000 + year,
        50..=99 => 1900 + year,
        _ => year,
    })
}

/// German and English month names, full or abbreviated.
fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "januar" | "january" | "jan" | "jänner" => 1,
        "februar" | "february" | "feb" => 2,
        "märz" | "maerz" | "marz" | "march" | "mär" | "mar" => 3,
        "april" | "apr" => 4,
        "mai" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nov" => 11,
        "dezember" | "december" | "dez" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_date_dmy() {
        assert_eq!(extract_date("Datum: 15.01.2024 14:32"), Some(date(2024, 1, 15)));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(extract_date("15.01.24"), Some(date(2024, 1, 15)));
        assert_eq!(extract_date("15.01.87"), Some(date(1987, 1, 15)));
    }

    #[test]
    fn test_iso_is_year_first() {
        assert_eq!(extract_date("2024-03-05"), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_slash_is_day_first() {
        assert_eq!(extract_date("05/03/2024"), Some(date(2024, 3, 5)));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(extract_date("Berlin, 12. März 2024"), Some(date(2024, 3, 12)));
        assert_eq!(extract_date("1 December 2023"), Some(date(2023, 12, 1)));
        assert_eq!(extract_date("3 Quartal 2024"), None);
    }

    #[test]
    fn test_invalid_dates_skipped() {
        assert_eq!(extract_date("31.02.2024 then 01.03.2024"), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_pattern_priority() {
        // The dotted form is preferred even if an ISO date comes first.
        assert_eq!(extract_date("2023-12-31 / 02.01.2024"), Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_parse_model_dates() {
        assert_eq!(parse_date("2024-03-01"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("01.03.2024"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("1 März 2024"), Some(date(2024, 3, 1)));
        assert_eq!(parse_date("unknown"), None);
        assert_eq!(parse_date(""), None);
    }
}
