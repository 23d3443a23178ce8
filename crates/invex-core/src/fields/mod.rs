//! Field normalization and validation.
//!
//! Normalizers are selected by an explicit `match` on the field's
//! [`FieldFormat`]; there is no runtime registry.

pub mod amounts;
pub mod dates;
pub mod identifiers;
pub mod patterns;
pub mod validate;

pub use amounts::{AmountExtractor, normalize_amount, parse_amount};
pub use dates::{DateExtractor, normalize_date};
pub use identifiers::{IdentifierExtractor, normalize_identifier};
pub use validate::{ValidationResult, Validator};

use crate::error::NormalizationError;
use crate::models::field::{FieldFormat, FieldSpec, FieldValue};

/// Trait for locating typed values inside a text span.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the preferred occurrence.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences in text order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value located in text with its confidence and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Byte range in the searched text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    /// Start offset, or `usize::MAX` for unpositioned matches.
    pub fn start(&self) -> usize {
        self.position.map(|(s, _)| s).unwrap_or(usize::MAX)
    }

    /// Replace the value with the matched source text.
    pub fn into_source(self) -> ExtractionMatch<String> {
        ExtractionMatch {
            value: self.source.clone(),
            confidence: self.confidence,
            position: self.position,
            source: self.source,
        }
    }
}

/// Convert a raw text fragment into the field's canonical value.
///
/// Pure function of its inputs. Normalizing the rendering of a
/// normalized value yields the same value.
pub fn normalize(raw: &str, spec: &FieldSpec) -> Result<FieldValue, NormalizationError> {
    match &spec.format {
        FieldFormat::Identifier { .. } => {
            normalize_identifier(raw, &spec.name).map(FieldValue::Text)
        }
        FieldFormat::Amount { .. } => normalize_amount(raw, &spec.name).map(FieldValue::Amount),
        FieldFormat::Date { .. } => normalize_date(raw, &spec.name).map(FieldValue::Date),
    }
}

/// Find the substring of a prose span that most plausibly holds the
/// field's value.
///
/// Used by label proximity search, where the span after a label is
/// mostly filler words.
pub fn locate_value(span: &str, spec: &FieldSpec) -> Option<ExtractionMatch<String>> {
    match &spec.format {
        FieldFormat::Identifier { .. } => IdentifierExtractor::new().extract(span),
        FieldFormat::Amount { .. } => AmountExtractor::new()
            .extract(span)
            .map(ExtractionMatch::into_source),
        FieldFormat::Date { .. } => DateExtractor::new()
            .extract(span)
            .map(ExtractionMatch::into_source),
    }
}
