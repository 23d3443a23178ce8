//! Amount normalization for invoice totals.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_PATTERN, CURRENCY_PREFIXED, CURRENCY_SUFFIXED};
use super::{ExtractionMatch, FieldExtractor};
use crate::error::NormalizationError;

/// Confidence assigned to numbers written next to a currency marker.
const CURRENCY_CONFIDENCE: f32 = 0.95;

/// Confidence assigned to bare numbers.
const BARE_CONFIDENCE: f32 = 0.6;

/// Amount field extractor.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    /// First currency-marked amount, else the first number.
    fn extract(&self, text: &str) -> Option<Self::Output> {
        let all = self.extract_all(text);
        all.iter()
            .find(|m| m.confidence >= CURRENCY_CONFIDENCE)
            .cloned()
            .or_else(|| all.into_iter().next())
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        for caps in CURRENCY_PREFIXED.captures_iter(text) {
            let negative = caps.get(1).is_some() || caps.get(2).is_some();
            if let Some(amount) = parse_number(&caps[3], negative) {
                let full_match = caps.get(0).unwrap();
                results.push(
                    ExtractionMatch::new(amount, CURRENCY_CONFIDENCE, full_match.as_str())
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        for caps in CURRENCY_SUFFIXED.captures_iter(text) {
            let full_match = caps.get(0).unwrap();
            if overlaps(&results, full_match.start(), full_match.end()) {
                continue;
            }
            if let Some(amount) = parse_number(&caps[2], caps.get(1).is_some()) {
                results.push(
                    ExtractionMatch::new(amount, CURRENCY_CONFIDENCE, full_match.as_str())
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        for caps in AMOUNT_PATTERN.captures_iter(text) {
            let full_match = caps.get(0).unwrap();
            if overlaps(&results, full_match.start(), full_match.end()) {
                continue;
            }
            if let Some(amount) = parse_number(&caps[2], caps.get(1).is_some()) {
                results.push(
                    ExtractionMatch::new(amount, BARE_CONFIDENCE, full_match.as_str())
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        results.sort_by_key(|m| m.start());
        results
    }
}

fn overlaps<T>(found: &[ExtractionMatch<T>], start: usize, end: usize) -> bool {
    found
        .iter()
        .filter_map(|m| m.position)
        .any(|(s, e)| start < e && s < end)
}

fn parse_number(digits: &str, negative: bool) -> Option<Decimal> {
    let cleaned = digits.replace(',', "");
    let cleaned = if cleaned.starts_with('.') {
        format!("0{}", cleaned)
    } else {
        cleaned
    };

    Decimal::from_str(&cleaned)
        .ok()
        .map(|d| if negative { -d } else { d })
}

/// Parse the preferred amount in a text fragment, sign included.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    AmountExtractor::new().extract(text).map(|m| m.value)
}

/// Normalize a raw amount string to a positive decimal.
///
/// Currency markers and thousands separators are dropped. The result
/// carries at least two decimal places; extra precision is kept so the
/// validator can report it.
pub fn normalize_amount(raw: &str, field: &str) -> Result<Decimal, NormalizationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizationError::Empty {
            field: field.to_string(),
        });
    }

    let amount = parse_amount(trimmed).ok_or_else(|| NormalizationError::NoNumber {
        field: field.to_string(),
        value: trimmed.to_string(),
    })?;

    if amount <= Decimal::ZERO {
        return Err(NormalizationError::NonPositive {
            field: field.to_string(),
            value: amount.to_string(),
        });
    }

    Ok(canonical_amount(amount))
}

/// Drop trailing zeros, then pad to at least two decimal places.
pub fn canonical_amount(amount: Decimal) -> Decimal {
    let mut amount = amount.normalize();
    if amount.scale() < 2 {
        amount.rescale(2);
    }
    amount
}
