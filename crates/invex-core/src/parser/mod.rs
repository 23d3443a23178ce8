//! Model output parsing.
//!
//! Turns free-form model text into one [`ExtractedField`] per configured
//! field. Strategies run in order:
//!
//! 1. JSON decode (strict, then lenient). Authoritative when it yields an
//!    object with at least one recognized field.
//! 2. `Label: value` scanning.
//! 3. Label proximity search, for fields key-value scanning missed.

mod json;
mod labels;
mod text;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{InvexError, ParsingError, Result};
use crate::fields::{self, Validator};
use crate::models::config::{InvexConfig, ParserConfig};
use crate::models::field::{ExtractedField, FieldSpec, ParseStrategy};

use labels::LabelIndex;

/// Trait for model output parsers.
pub trait OutputParser {
    /// Fields produced for every document.
    fn fields(&self) -> &[FieldSpec];

    /// Parse model output text.
    fn parse(&self, text: &str) -> std::result::Result<ParsedDocument, ParsingError>;

    /// Parse raw model output bytes.
    fn parse_bytes(&self, bytes: &[u8]) -> std::result::Result<ParsedDocument, ParsingError> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| ParsingError::InvalidEncoding(e.to_string()))?;
        self.parse(text.trim_start_matches('\u{feff}'))
    }
}

/// Fields extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// One entry per configured field, keyed by field name.
    pub fields: BTreeMap<String, ExtractedField>,

    /// Strategies attempted, in order.
    pub strategies_tried: Vec<ParseStrategy>,
}

impl ParsedDocument {
    /// A document in which no field was found.
    pub fn not_found(specs: &[FieldSpec]) -> Self {
        Self {
            fields: specs
                .iter()
                .map(|spec| (spec.name.clone(), ExtractedField::not_found(spec)))
                .collect(),
            strategies_tried: Vec::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&ExtractedField> {
        self.fields.get(field)
    }

    /// Whether every field passed validation.
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(ExtractedField::is_valid)
    }

    /// Number of fields located by any strategy.
    pub fn found_count(&self) -> usize {
        self.fields.values().filter(|f| f.is_found()).count()
    }
}

/// Default output parser over an explicit field list.
#[derive(Debug, Clone)]
pub struct FieldOutputParser {
    fields: Vec<FieldSpec>,
    validators: Vec<Validator>,
    labels: LabelIndex,
    config: ParserConfig,
}

impl FieldOutputParser {
    /// Create a parser for the given fields.
    pub fn new(fields: Vec<FieldSpec>, config: ParserConfig) -> Result<Self> {
        let labels = LabelIndex::new(&fields)
            .map_err(|e| InvexError::Config(format!("invalid field labels: {}", e)))?;
        let validators = fields.iter().map(Validator::for_spec).collect();

        Ok(Self {
            fields,
            validators,
            labels,
            config,
        })
    }

    /// Create a parser from the full pipeline configuration.
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        Self::new(config.fields.clone(), config.parser.clone())
    }

    fn build_field(&self, index: usize, raw: String, source: ParseStrategy) -> ExtractedField {
        let spec = &self.fields[index];

        match fields::normalize(&raw, spec) {
            Ok(value) => {
                let result = self.validators[index].validate(Some(&value));
                trace!(
                    "{}: '{}' -> {} via {} (valid: {})",
                    spec.name, raw, value, source, result.is_valid
                );
                ExtractedField::found(spec, raw, Some(value), result.errors, source)
            }
            Err(e) => {
                debug!("{}: could not normalize '{}': {}", spec.name, raw, e);
                ExtractedField::found(spec, raw, None, vec![e.to_string()], source)
            }
        }
    }

    fn assemble(&self, found: Vec<Option<(String, ParseStrategy)>>, strategies_tried: Vec<ParseStrategy>) -> ParsedDocument {
        let fields = found
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let spec = &self.fields[index];
                let field = match value {
                    Some((raw, source)) => self.build_field(index, raw, source),
                    None => {
                        debug!("{}: not found", spec.name);
                        ExtractedField::not_found(spec)
                    }
                };
                (spec.name.clone(), field)
            })
            .collect();

        ParsedDocument {
            fields,
            strategies_tried,
        }
    }
}

impl OutputParser for FieldOutputParser {
    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn parse(&self, text: &str) -> std::result::Result<ParsedDocument, ParsingError> {
        check_text(text)?;

        let mut strategies_tried = vec![ParseStrategy::Json];
        if let Some(values) = json::extract(text, &self.fields, self.config.lenient_json) {
            debug!("Parsed output as JSON");
            let found = values
                .into_iter()
                .map(|v| v.map(|raw| (raw, ParseStrategy::Json)))
                .collect();
            return Ok(self.assemble(found, strategies_tried));
        }

        strategies_tried.push(ParseStrategy::KeyValue);
        let mut found: Vec<Option<(String, ParseStrategy)>> =
            text::key_values(text, &self.labels, self.fields.len())
                .into_iter()
                .map(|v| v.map(|raw| (raw, ParseStrategy::KeyValue)))
                .collect();

        if found.iter().any(Option::is_none) {
            strategies_tried.push(ParseStrategy::Proximity);
            for (index, slot) in found.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = text::proximity(
                        text,
                        &self.labels,
                        index,
                        &self.fields[index],
                        self.config.proximity_window,
                    )
                    .map(|raw| (raw, ParseStrategy::Proximity));
                }
            }
        }

        debug!(
            "Parsed output with {} ({} of {} fields found)",
            strategies_tried
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            found.iter().filter(|f| f.is_some()).count(),
            self.fields.len()
        );

        Ok(self.assemble(found, strategies_tried))
    }
}

/// Reject output that cannot hold any field.
fn check_text(text: &str) -> std::result::Result<(), ParsingError> {
    if text.trim().is_empty() {
        return Err(ParsingError::EmptyOutput);
    }

    let control = text
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    if text.contains('\0') || control * 10 > text.chars().count() {
        return Err(ParsingError::Binary(control));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::field::{FIELD_NOT_FOUND, FieldValue};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn parser() -> FieldOutputParser {
        FieldOutputParser::new(
            vec![FieldSpec::work_order(), FieldSpec::total()],
            ParserConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_key_value_document() {
        let doc = parser()
            .parse("Work Order Number: 00123\nTotal: $1,234.56")
            .unwrap();

        let work_order = doc.get("work_order").unwrap();
        assert_eq!(
            work_order.normalized_value(),
            Some(&FieldValue::Text("00123".to_string()))
        );
        assert!(work_order.is_valid());
        assert_eq!(work_order.source(), Some(ParseStrategy::KeyValue));

        let total = doc.get("total").unwrap();
        assert_eq!(total.raw_value(), Some("$1,234.56"));
        assert_eq!(
            total.normalized_value(),
            Some(&FieldValue::Amount(Decimal::new(123456, 2)))
        );
        assert_eq!(
            doc.strategies_tried,
            vec![ParseStrategy::Json, ParseStrategy::KeyValue]
        );
        assert!(doc.is_valid());
    }

    #[test]
    fn test_line_items_do_not_shadow_total() {
        let doc = parser()
            .parse("Work Order Number: 00123\nSubtotal: $100.00\nTax Amount: $8.00\nTotal: $108.00")
            .unwrap();
        let total = doc.get("total").unwrap();
        assert_eq!(total.raw_value(), Some("$108.00"));
        assert_eq!(total.source(), Some(ParseStrategy::KeyValue));

        let doc = parser()
            .parse("Unit Price: $5.00\nWork Order: 00123\nTotal: $100.00")
            .unwrap();
        assert_eq!(doc.get("total").unwrap().raw_value(), Some("$100.00"));
    }

    #[test]
    fn test_other_order_numbers_do_not_shadow_work_order() {
        let doc = parser()
            .parse("Purchase Order Number: 99999\nWork Order Number: 00123\nTotal: $5.00")
            .unwrap();
        assert_eq!(doc.get("work_order").unwrap().raw_value(), Some("00123"));
    }

    #[test]
    fn test_json_is_authoritative() {
        let doc = parser()
            .parse(r#"{"work_order": "5A-221", "total": "2000"}"#)
            .unwrap();

        assert_eq!(doc.strategies_tried, vec![ParseStrategy::Json]);

        let work_order = doc.get("work_order").unwrap();
        assert_eq!(work_order.source(), Some(ParseStrategy::Json));
        assert_eq!(
            work_order.normalized_value(),
            Some(&FieldValue::Text("5A-221".to_string()))
        );
        assert!(!work_order.is_valid());

        assert_eq!(doc.get("total").unwrap().normalized_value().unwrap().to_string(), "2000.00");
    }

    #[test]
    fn test_json_missing_field_has_no_fallback() {
        let doc = parser()
            .parse("{\"work_order\": \"00123\"}\nTotal: $5.00")
            .unwrap();
        assert_eq!(doc.strategies_tried, vec![ParseStrategy::Json]);
        assert!(!doc.get("total").unwrap().is_found());
    }

    #[test]
    fn test_proximity_fallback() {
        let doc = parser()
            .parse("Work Order: 00123\nThe grand total on this invoice is $88.10.")
            .unwrap();

        assert_eq!(
            doc.strategies_tried,
            vec![ParseStrategy::Json, ParseStrategy::KeyValue, ParseStrategy::Proximity]
        );
        assert_eq!(doc.get("work_order").unwrap().source(), Some(ParseStrategy::KeyValue));

        let total = doc.get("total").unwrap();
        assert_eq!(total.source(), Some(ParseStrategy::Proximity));
        assert_eq!(total.normalized_value().unwrap().to_string(), "88.10");
    }

    #[test]
    fn test_missing_required_field() {
        let doc = parser().parse("Work Order Number: 00123").unwrap();
        let total = doc.get("total").unwrap();

        assert!(!total.is_valid());
        assert!(total.normalized_value().is_none());
        assert_eq!(total.validation_errors(), [FIELD_NOT_FOUND.to_string()]);
        assert!(doc.get("work_order").unwrap().is_valid());
    }

    #[test]
    fn test_unnormalizable_value_keeps_raw() {
        let doc = parser().parse("Work Order: 00123\nTotal: not legible").unwrap();
        let total = doc.get("total").unwrap();

        assert!(total.is_found());
        assert_eq!(total.raw_value(), Some("not legible"));
        assert!(total.normalized_value().is_none());
        assert!(!total.is_valid());
        assert!(total.validation_errors()[0].contains("no number"));
    }

    #[test]
    fn test_invalid_value_keeps_typed_normalization() {
        let doc = parser().parse("Work Order: 0012\nTotal: 12.345").unwrap();

        let work_order = doc.get("work_order").unwrap();
        assert!(!work_order.is_valid());
        assert_eq!(work_order.normalized_value().unwrap().to_string(), "0012");

        let total = doc.get("total").unwrap();
        assert!(!total.is_valid());
        assert_eq!(total.normalized_value().unwrap().to_string(), "12.345");
    }

    #[test]
    fn test_no_labels() {
        let doc = parser().parse("I cannot read this image.").unwrap();
        assert_eq!(doc.found_count(), 0);
        assert_eq!(doc.fields.len(), 2);
        assert!(!doc.is_valid());
    }

    #[test]
    fn test_document_errors() {
        assert_eq!(parser().parse("  \n "), Err(ParsingError::EmptyOutput));
        assert!(matches!(
            parser().parse("Total\0\0: 5"),
            Err(ParsingError::Binary(2))
        ));
        assert!(matches!(
            parser().parse_bytes(&[0x54, 0xff, 0xfe]),
            Err(ParsingError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let doc = parser()
            .parse_bytes("\u{feff}{\"work_order\": \"00123\", \"total\": 5}".as_bytes())
            .unwrap();
        assert_eq!(doc.strategies_tried, vec![ParseStrategy::Json]);
    }

    #[test]
    fn test_strict_json_disabled_leniency() {
        let parser = FieldOutputParser::new(
            vec![FieldSpec::work_order(), FieldSpec::total()],
            ParserConfig {
                lenient_json: false,
                ..ParserConfig::default()
            },
        )
        .unwrap();

        let doc = parser.parse("{'work_order': '00123', 'total': '5'}").unwrap();
        assert_eq!(
            doc.strategies_tried,
            vec![ParseStrategy::Json, ParseStrategy::KeyValue]
        );
        assert_eq!(doc.get("work_order").unwrap().raw_value(), Some("00123"));
    }
}
