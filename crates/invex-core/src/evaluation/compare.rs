//! Field comparison against ground truth.

use rust_decimal::Decimal;
use tracing::debug;

use crate::fields::normalize_amount;
use crate::models::config::{CerMode, ComparisonConfig, ToleranceBound};
use crate::models::evaluation::ComparisonResult;
use crate::models::field::{ExtractedField, FieldSpec, FieldValue};
use crate::models::ground_truth::GroundTruthRecord;
use crate::parser::ParsedDocument;

/// Compares extracted fields with ground truth values.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    config: ComparisonConfig,
}

impl Comparator {
    pub fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Field-type specific equality.
    ///
    /// Text compares case-insensitively, amounts within the configured
    /// tolerance, dates exactly. Values of different types never match.
    pub fn values_match(&self, extracted: &FieldValue, truth: &FieldValue) -> bool {
        match (extracted, truth) {
            (FieldValue::Amount(a), FieldValue::Amount(b)) => self.amounts_match(*a, *b),
            (FieldValue::Text(_), FieldValue::Text(_)) => {
                extracted.comparison_key() == truth.comparison_key()
            }
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            _ => false,
        }
    }

    /// Tolerance comparison of two amounts.
    pub fn amounts_match(&self, a: Decimal, b: Decimal) -> bool {
        let difference = (a - b).abs();
        match self.config.tolerance_bound {
            ToleranceBound::Exclusive => difference < self.config.amount_epsilon,
            ToleranceBound::Inclusive => difference <= self.config.amount_epsilon,
        }
    }

    /// Error rate of an extracted string against a reference string,
    /// using the configured granularity.
    pub fn error_rate(&self, extracted: &str, reference: &str) -> f64 {
        match self.config.cer_mode {
            CerMode::Character => character_error_rate(extracted, reference),
            CerMode::Word => word_error_rate(extracted, reference),
        }
    }

    /// Compare one extracted field with its ground truth value.
    ///
    /// A field that was not found, or found but not normalized, is a
    /// mismatch. `error` records a document-level failure reason.
    pub fn compare_field(
        &self,
        invoice_id: &str,
        spec: &FieldSpec,
        extracted: &ExtractedField,
        truth: &FieldValue,
        error: Option<&str>,
    ) -> ComparisonResult {
        let exact_match = extracted
            .normalized_value()
            .is_some_and(|value| self.values_match(value, truth));

        let extracted_text = extracted
            .normalized_value()
            .map(ToString::to_string)
            .or_else(|| extracted.raw_value().map(str::to_string));

        let truth_text = truth.to_string();
        let cer = match truth {
            FieldValue::Text(_) => self.error_rate(
                &extracted_text.as_deref().unwrap_or_default().to_lowercase(),
                &truth_text.to_lowercase(),
            ),
            _ => self.error_rate(extracted_text.as_deref().unwrap_or_default(), &truth_text),
        };

        ComparisonResult::new(
            invoice_id,
            spec.name.clone(),
            exact_match,
            cer,
            truth_text,
            extracted_text,
            extracted.is_found(),
            extracted.is_valid(),
            error.map(str::to_string),
        )
    }

    /// Compare every field of a parsed document that has a ground truth value.
    pub fn compare_document(
        &self,
        invoice_id: &str,
        specs: &[FieldSpec],
        document: &ParsedDocument,
        truth: &GroundTruthRecord,
        error: Option<&str>,
    ) -> Vec<ComparisonResult> {
        specs
            .iter()
            .filter_map(|spec| {
                let Some(truth_value) = truth.get(&spec.name) else {
                    debug!("{}: no ground truth for {}, skipped", invoice_id, spec.name);
                    return None;
                };
                let extracted = document
                    .get(&spec.name)
                    .cloned()
                    .unwrap_or_else(|| ExtractedField::not_found(spec));
                Some(self.compare_field(invoice_id, spec, &extracted, truth_value, error))
            })
            .collect()
    }
}

/// Compare an extracted total string with an expected amount using the
/// default tolerance.
///
/// Returns false when the extracted text holds no positive amount.
pub fn compare_total(expected: Decimal, extracted: &str) -> bool {
    match normalize_amount(extracted, "total") {
        Ok(amount) => Comparator::default().amounts_match(amount, expected),
        Err(_) => false,
    }
}

/// Levenshtein distance over characters divided by the reference length.
///
/// An empty reference counts as length one.
pub fn character_error_rate(extracted: &str, reference: &str) -> f64 {
    let distance = strsim::levenshtein(extracted, reference);
    distance as f64 / reference.chars().count().max(1) as f64
}

/// Levenshtein distance over whitespace-separated words divided by the
/// number of reference words.
pub fn word_error_rate(extracted: &str, reference: &str) -> f64 {
    let extracted: Vec<&str> = extracted.split_whitespace().collect();
    let reference: Vec<&str> = reference.split_whitespace().collect();
    let distance = strsim::generic_levenshtein(&extracted, &reference);
    distance as f64 / reference.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FieldOutputParser, OutputParser};
    use crate::models::config::ParserConfig;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn inclusive() -> Comparator {
        Comparator::new(ComparisonConfig {
            tolerance_bound: ToleranceBound::Inclusive,
            ..ComparisonConfig::default()
        })
    }

    fn record() -> GroundTruthRecord {
        let mut fields = BTreeMap::new();
        fields.insert("work_order".to_string(), FieldValue::Text("00123".to_string()));
        fields.insert("total".to_string(), FieldValue::Amount(dec("1234.56")));
        GroundTruthRecord {
            invoice_id: "1017".to_string(),
            fields,
        }
    }

    fn parser() -> FieldOutputParser {
        FieldOutputParser::new(
            vec![FieldSpec::work_order(), FieldSpec::total()],
            ParserConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_compare_total() {
        assert!(compare_total(dec("100.00"), "100.00"));
        assert!(compare_total(dec("100.00"), "$100"));
        assert!(compare_total(dec("100.00"), "100.009"));
        assert!(!compare_total(dec("100.00"), "100.01"));
        assert!(!compare_total(dec("100.00"), "99.99"));
        assert!(!compare_total(dec("100.00"), "unreadable"));
    }

    #[test]
    fn test_epsilon_boundary_both_bounds() {
        let exclusive = Comparator::default();
        let inclusive = inclusive();

        // Just inside
        assert!(exclusive.amounts_match(dec("100.00"), dec("100.009")));
        assert!(inclusive.amounts_match(dec("100.00"), dec("100.009")));

        // On the boundary
        assert!(!exclusive.amounts_match(dec("100.00"), dec("100.01")));
        assert!(inclusive.amounts_match(dec("100.00"), dec("100.01")));

        // Just outside
        assert!(!exclusive.amounts_match(dec("100.00"), dec("100.011")));
        assert!(!inclusive.amounts_match(dec("100.00"), dec("100.011")));
    }

    #[test]
    fn test_identifier_case_insensitive() {
        let comparator = Comparator::default();
        let a = FieldValue::Text("ab12c".to_string());
        let b = FieldValue::Text("AB12C".to_string());
        assert!(comparator.values_match(&a, &b));
        assert!(!comparator.values_match(&FieldValue::Text("0123".to_string()), &b));
        assert!(!comparator.values_match(&FieldValue::Amount(dec("1")), &b));
    }

    #[test]
    fn test_character_error_rate() {
        assert_eq!(character_error_rate("00123", "00123"), 0.0);
        assert_eq!(character_error_rate("00124", "00123"), 0.2);
        assert_eq!(character_error_rate("", "00123"), 1.0);
        assert_eq!(character_error_rate("", ""), 0.0);
        assert_eq!(character_error_rate("ab", ""), 2.0);
    }

    #[test]
    fn test_word_error_rate() {
        assert_eq!(word_error_rate("net 30 days", "net 30 days"), 0.0);
        assert_eq!(word_error_rate("net 60 days", "net 30 days"), 1.0 / 3.0);
        assert_eq!(word_error_rate("", "net 30"), 1.0);
    }

    #[test]
    fn test_key_value_document_matches() {
        let document = parser()
            .parse("Work Order Number: 00123\nTotal: $1,234.56")
            .unwrap();
        let results = Comparator::default().compare_document(
            "1017",
            parser().fields(),
            &document,
            &record(),
            None,
        );

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.exact_match(), "{} did not match", result.field_name());
            assert_eq!(result.cer(), 0.0);
            assert!(result.found());
            assert!(result.valid());
        }
    }

    #[test]
    fn test_no_labels_all_mismatch() {
        let document = parser().parse("Sorry, the image is blurry.").unwrap();
        let results = Comparator::default().compare_document(
            "1017",
            parser().fields(),
            &document,
            &record(),
            None,
        );

        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.exact_match());
            assert!(!result.found());
            assert_eq!(result.extracted_value(), None);
            assert_eq!(result.cer(), 1.0);
        }
    }

    #[test]
    fn test_identifier_cer_ignores_case() {
        let mut fields = BTreeMap::new();
        fields.insert("work_order".to_string(), FieldValue::Text("AB12C".to_string()));
        let truth = GroundTruthRecord {
            invoice_id: "1".to_string(),
            fields,
        };

        let document = parser().parse("Work Order: ab12d").unwrap();
        let results = Comparator::default().compare_document("1", parser().fields(), &document, &truth, None);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].cer(), 0.2);
        assert_eq!(results[0].ground_truth_value(), "AB12C");
    }

    #[test]
    fn test_unnormalized_extraction_scored_on_raw_text() {
        let document = parser().parse("Work Order: 00123\nTotal: n/a").unwrap();
        let results =
            Comparator::default().compare_document("1017", parser().fields(), &document, &record(), None);

        let total = results.iter().find(|r| r.field_name() == "total").unwrap();
        assert!(!total.exact_match());
        assert!(total.found());
        assert!(!total.valid());
        assert_eq!(total.extracted_value(), Some("n/a"));
    }
}
