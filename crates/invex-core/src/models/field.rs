//! Field descriptors and extracted field values.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Static descriptor of an extractable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical field name (key in results and ground truth).
    pub name: String,

    /// Human-readable label, also accepted as a synonym.
    pub label: String,

    /// Additional label spellings accepted in model output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,

    /// Whether a missing value makes the field invalid.
    #[serde(default = "default_required")]
    pub required: bool,

    /// Format contract; also fixes the expected value type.
    pub format: FieldFormat,
}

fn default_required() -> bool {
    true
}

/// Format contract of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldFormat {
    /// String-preserving identifier (work order numbers).
    Identifier {
        /// Minimum length in characters.
        min_len: usize,
        /// Maximum length in characters.
        max_len: usize,
        /// Non-alphanumeric characters allowed inside the value.
        #[serde(default, skip_serializing_if = "String::is_empty")]
        separators: String,
    },

    /// Positive decimal amount (totals).
    Amount {
        /// Maximum number of decimal places.
        max_decimals: u32,
    },

    /// Calendar date.
    Date {
        /// Earliest accepted date.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        earliest: Option<NaiveDate>,
        /// Latest accepted date.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        latest: Option<NaiveDate>,
    },
}

impl FieldFormat {
    /// The value type produced by normalization under this format.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldFormat::Identifier { .. } => ValueType::Text,
            FieldFormat::Amount { .. } => ValueType::Numeric,
            FieldFormat::Date { .. } => ValueType::Date,
        }
    }
}

/// Declared type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// String-preserving text.
    Text,
    /// Decimal number.
    Numeric,
    /// Calendar date.
    Date,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Text => "text",
            ValueType::Numeric => "numeric",
            ValueType::Date => "date",
        };
        f.write_str(name)
    }
}

impl FieldSpec {
    /// Create a spec with no synonyms beyond its name and label.
    pub fn new(name: impl Into<String>, label: impl Into<String>, format: FieldFormat) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            synonyms: Vec::new(),
            required: true,
            format,
        }
    }

    /// Add accepted label synonyms.
    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }

    /// Set whether the field is required.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Work order number: exactly five alphanumerics, leading zeros kept.
    pub fn work_order() -> Self {
        Self::new(
            "work_order",
            "Work Order Number",
            FieldFormat::Identifier {
                min_len: 5,
                max_len: 5,
                separators: String::new(),
            },
        )
        .with_synonyms([
            "work order",
            "workorder",
            "work order no",
            "work order #",
            "order number",
            "wo number",
            "wo",
            "numero de orden",
        ])
    }

    /// Invoice total: positive decimal with at most two places.
    pub fn total() -> Self {
        Self::new("total", "Total", FieldFormat::Amount { max_decimals: 2 }).with_synonyms([
            "total amount",
            "total cost",
            "total price",
            "total due",
            "grand total",
            "invoice total",
            "invoice amount",
            "amount due",
            "balance due",
            "amount",
            "cost",
            "price",
        ])
    }

    /// Invoice date, canonicalized to ISO format.
    pub fn invoice_date() -> Self {
        Self::new(
            "date",
            "Invoice Date",
            FieldFormat::Date {
                earliest: None,
                latest: None,
            },
        )
        .with_synonyms(["date", "date of invoice", "issue date", "invoice dated"])
    }

    /// Expected value type.
    pub fn value_type(&self) -> ValueType {
        self.format.value_type()
    }

    /// All accepted label spellings: name, label and synonyms.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(std::iter::once(self.label.as_str()))
            .chain(self.synonyms.iter().map(String::as_str))
    }

    /// Check whether a label found in model output refers to this field.
    pub fn matches_label(&self, label: &str) -> bool {
        let wanted = normalize_label(label);
        !wanted.is_empty() && self.labels().any(|l| normalize_label(l) == wanted)
    }
}

/// Canonical form of a label for synonym comparison.
///
/// Lowercases, treats `_` and `-` as spaces, drops markup characters and
/// collapses whitespace: `"**Work_Order  Number:**"` becomes
/// `"work order number"`.
pub fn normalize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .filter(|c| !matches!(c, '*' | '"' | '\'' | '`' | ':' | '='))
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical typed value of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Identifier text with original casing and leading zeros.
    Text(String),
    /// Decimal amount, at least two decimal places.
    Amount(Decimal),
    /// Calendar date.
    Date(NaiveDate),
}

impl FieldValue {
    /// Type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Text(_) => ValueType::Text,
            FieldValue::Amount(_) => ValueType::Numeric,
            FieldValue::Date(_) => ValueType::Date,
        }
    }

    /// Key used for equality checks; text compares case-insensitively.
    pub fn comparison_key(&self) -> String {
        match self {
            FieldValue::Text(s) => s.to_lowercase(),
            other => other.to_string(),
        }
    }

    /// Amount value, if this is an amount.
    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            FieldValue::Amount(d) => Some(*d),
            _ => None,
        }
    }

    /// Date value, if this is a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the value carries no content.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Amount(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Strategy that located a field in model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    /// Strict (or lenient) JSON decode.
    Json,
    /// `Label: value` pairs.
    KeyValue,
    /// Label search in free prose.
    Proximity,
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseStrategy::Json => "json",
            ParseStrategy::KeyValue => "key_value",
            ParseStrategy::Proximity => "proximity",
        };
        f.write_str(name)
    }
}

/// One field extracted from one document.
///
/// Produced once by the output parser; there are no mutating accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    normalized_value: Option<FieldValue>,
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    validation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<ParseStrategy>,
}

/// Error text recorded when no label for a field was found.
pub const FIELD_NOT_FOUND: &str = "field not found";

impl ExtractedField {
    /// A field whose value was located in the output.
    pub(crate) fn found(
        spec: &FieldSpec,
        raw_value: String,
        normalized_value: Option<FieldValue>,
        validation_errors: Vec<String>,
        source: ParseStrategy,
    ) -> Self {
        Self {
            field_name: spec.name.clone(),
            raw_value: Some(raw_value),
            normalized_value,
            is_valid: validation_errors.is_empty(),
            validation_errors,
            source: Some(source),
        }
    }

    /// A field with no matching label in the output.
    pub(crate) fn not_found(spec: &FieldSpec) -> Self {
        let validation_errors = if spec.required {
            vec![FIELD_NOT_FOUND.to_string()]
        } else {
            Vec::new()
        };

        Self {
            field_name: spec.name.clone(),
            raw_value: None,
            normalized_value: None,
            is_valid: validation_errors.is_empty(),
            validation_errors,
            source: None,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Text span as captured from the output.
    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    /// Canonical value; `None` when not found or not coercible.
    pub fn normalized_value(&self) -> Option<&FieldValue> {
        self.normalized_value.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    /// Strategy that found the value.
    pub fn source(&self) -> Option<ParseStrategy> {
        self.source
    }

    /// Whether a label for the field was located at all.
    pub fn is_found(&self) -> bool {
        self.raw_value.is_some()
    }
}
