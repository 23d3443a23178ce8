//! Date normalization for invoice dates.

use chrono::NaiveDate;
use regex::Captures;

use super::patterns::{DATE_DASH, DATE_DAY_FIRST, DATE_ISO, DATE_MONTH_FIRST, DATE_SLASH};
use super::{ExtractionMatch, FieldExtractor};
use crate::error::NormalizationError;

/// Date field extractor.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        // YYYY-MM-DD
        collect(&mut results, text, &DATE_ISO, 1.0, |caps| {
            NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
        });

        // MM/DD/YYYY, falling back to DD/MM/YYYY when the month is out of range
        collect(&mut results, text, &DATE_SLASH, 0.85, |caps| {
            let first: u32 = caps[1].parse().ok()?;
            let second: u32 = caps[2].parse().ok()?;
            let year = parse_year(&caps[3]);
            NaiveDate::from_ymd_opt(year, first, second)
                .or_else(|| NaiveDate::from_ymd_opt(year, second, first))
        });

        // DD-MM-YYYY, falling back to MM-DD-YYYY
        collect(&mut results, text, &DATE_DASH, 0.85, |caps| {
            let first: u32 = caps[1].parse().ok()?;
            let second: u32 = caps[2].parse().ok()?;
            let year = parse_year(&caps[3]);
            NaiveDate::from_ymd_opt(year, second, first)
                .or_else(|| NaiveDate::from_ymd_opt(year, first, second))
        });

        // "March 7, 2024"
        collect(&mut results, text, &DATE_MONTH_FIRST, 0.95, |caps| {
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month_to_number(&caps[1])?, caps[2].parse().ok()?)
        });

        // "7 March 2024"
        collect(&mut results, text, &DATE_DAY_FIRST, 0.95, |caps| {
            NaiveDate::from_ymd_opt(caps[3].parse().ok()?, month_to_number(&caps[2])?, caps[1].parse().ok()?)
        });

        results.sort_by_key(|m| m.start());
        results
    }
}

fn collect(
    results: &mut Vec<ExtractionMatch<NaiveDate>>,
    text: &str,
    pattern: &regex::Regex,
    confidence: f32,
    build: impl Fn(&Captures<'_>) -> Option<NaiveDate>,
) {
    for caps in pattern.captures_iter(text) {
        let full_match = caps.get(0).unwrap();

        // Skip spans already claimed by an earlier pattern
        let taken = results
            .iter()
            .filter_map(|m| m.position)
            .any(|(s, e)| full_match.start() < e && s < full_match.end());
        if taken {
            continue;
        }

        if let Some(date) = build(&caps) {
            results.push(
                ExtractionMatch::new(date, confidence, full_match.as_str())
                    .with_position(full_match.start(), full_match.end()),
            );
        }
    }
}

/// Normalize a raw date string to a calendar date.
///
/// The first date in the fragment wins. Render with `%Y-%m-%d` for the
/// canonical form.
pub fn normalize_date(raw: &str, field: &str) -> Result<NaiveDate, NormalizationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizationError::Empty {
            field: field.to_string(),
        });
    }

    DateExtractor::new()
        .extract(trimmed)
        .map(|m| m.value)
        .ok_or_else(|| NormalizationError::UnparseableDate {
            field: field.to_string(),
            value: trimmed.to_string(),
        })
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

fn month_to_number(month: &str) -> Option<u32> {
    let month = month.to_lowercase();
    let number = match month.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_supported_formats() {
        assert_eq!(normalize_date("03/07/2024", "date").unwrap(), ymd(2024, 3, 7));
        assert_eq!(normalize_date("15-01-2024", "date").unwrap(), ymd(2024, 1, 15));
        assert_eq!(normalize_date("March 7, 2024", "date").unwrap(), ymd(2024, 3, 7));
        assert_eq!(normalize_date("Mar 7 2024", "date").unwrap(), ymd(2024, 3, 7));
        assert_eq!(normalize_date("7th March 2024", "date").unwrap(), ymd(2024, 3, 7));
        assert_eq!(normalize_date("2024-03-07", "date").unwrap(), ymd(2024, 3, 7));
    }

    #[test]
    fn test_day_month_swap_when_out_of_range() {
        assert_eq!(normalize_date("15/01/2024", "date").unwrap(), ymd(2024, 1, 15));
        assert_eq!(normalize_date("01-15-2024", "date").unwrap(), ymd(2024, 1, 15));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(normalize_date("1/2/24", "date").unwrap(), ymd(2024, 1, 2));
        assert_eq!(normalize_date("1/2/99", "date").unwrap(), ymd(1999, 1, 2));
    }

    #[test]
    fn test_first_date_in_fragment_wins() {
        let text = "issued on January 5, 2024, due 02/04/2024";
        assert_eq!(normalize_date(text, "date").unwrap(), ymd(2024, 1, 5));
    }

    #[test]
    fn test_unparseable_date() {
        assert!(matches!(
            normalize_date("sometime last spring", "date"),
            Err(NormalizationError::UnparseableDate { .. })
        ));
        assert!(matches!(
            normalize_date("13/13/2024", "date"),
            Err(NormalizationError::UnparseableDate { .. })
        ));
        assert!(matches!(
            normalize_date("", "date"),
            Err(NormalizationError::Empty { .. })
        ));
    }
}
