//! Identifier (work order number) normalization.

use super::patterns::IDENTIFIER_TOKEN;
use super::{ExtractionMatch, FieldExtractor};
use crate::error::NormalizationError;

/// Locates identifier-looking tokens in free text.
///
/// Only tokens containing at least one digit qualify, which skips the
/// filler words models put between a label and its value.
pub struct IdentifierExtractor;

impl IdentifierExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IdentifierExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for IdentifierExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        IDENTIFIER_TOKEN
            .find_iter(text)
            .filter(|m| m.as_str().chars().any(|c| c.is_ascii_digit()))
            .map(|m| {
                ExtractionMatch::new(m.as_str().to_string(), 0.7, m.as_str())
                    .with_position(m.start(), m.end())
            })
            .collect()
    }
}

/// Normalize an identifier: trim surrounding whitespace, nothing else.
///
/// Leading zeros and casing are preserved; case-insensitive comparison
/// happens on [`crate::models::field::FieldValue::comparison_key`].
pub fn normalize_identifier(raw: &str, field: &str) -> Result<String, NormalizationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizationError::Empty {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_zeros_preserved() {
        assert_eq!(normalize_identifier("00123", "work_order").unwrap(), "00123");
        assert_eq!(normalize_identifier("  00123 \n", "work_order").unwrap(), "00123");
    }

    #[test]
    fn test_casing_preserved() {
        assert_eq!(normalize_identifier("aB12c", "work_order").unwrap(), "aB12c");
    }

    #[test]
    fn test_empty_identifier() {
        assert!(matches!(
            normalize_identifier(" \t", "work_order"),
            Err(NormalizationError::Empty { .. })
        ));
    }

    #[test]
    fn test_extract_tokens_with_digits() {
        let extractor = IdentifierExtractor::new();
        let tokens: Vec<String> = extractor
            .extract_all("is listed as 5A-221 (ref 00077).")
            .into_iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(tokens, vec!["5A-221", "00077"]);
    }
}
