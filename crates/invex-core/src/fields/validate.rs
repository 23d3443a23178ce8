//! Field validators.
//!
//! Validation never fails with an error: every check produces a
//! [`ValidationResult`], so parsing continues for the other fields.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::field::{FieldFormat, FieldSpec, FieldValue, ValueType};

/// Outcome of validating one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![error.into()],
        }
    }

    /// Combine two results: valid only if both are, errors concatenated.
    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

/// A check applied to a normalized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Value must be present and non-empty.
    Required,
    /// Value must have the declared type.
    Type(ValueType),
    /// Value must satisfy the field's format contract.
    Format(FieldFormat),
    /// All children must pass.
    Composite(Vec<Validator>),
}

impl Validator {
    /// Standard validator chain for a field spec.
    pub fn for_spec(spec: &FieldSpec) -> Self {
        let mut checks = Vec::with_capacity(3);
        if spec.required {
            checks.push(Validator::Required);
        }
        checks.push(Validator::Type(spec.value_type()));
        checks.push(Validator::Format(spec.format.clone()));
        Validator::Composite(checks)
    }

    /// Validate a value; `None` means the value is absent.
    ///
    /// Only `Required` rejects an absent value.
    pub fn validate(&self, value: Option<&FieldValue>) -> ValidationResult {
        match self {
            Validator::Required => match value {
                None => ValidationResult::invalid("value is required"),
                Some(v) if v.is_empty() => ValidationResult::invalid("value is empty"),
                Some(_) => ValidationResult::valid(),
            },
            Validator::Type(expected) => match value {
                Some(v) if v.value_type() != *expected => ValidationResult::invalid(format!(
                    "expected a {} value, got {}",
                    expected,
                    v.value_type()
                )),
                _ => ValidationResult::valid(),
            },
            Validator::Format(format) => match value {
                Some(v) => validate_format(format, v),
                None => ValidationResult::valid(),
            },
            Validator::Composite(checks) => checks
                .iter()
                .fold(ValidationResult::valid(), |acc, check| acc.merge(check.validate(value))),
        }
    }
}

fn validate_format(format: &FieldFormat, value: &FieldValue) -> ValidationResult {
    match (format, value) {
        (
            FieldFormat::Identifier {
                min_len,
                max_len,
                separators,
            },
            FieldValue::Text(text),
        ) => validate_identifier(text, *min_len, *max_len, separators),
        (FieldFormat::Amount { max_decimals }, FieldValue::Amount(amount)) => {
            validate_amount(*amount, *max_decimals)
        }
        (FieldFormat::Date { earliest, latest }, FieldValue::Date(date)) => {
            let mut result = ValidationResult::valid();
            if let Some(earliest) = earliest.filter(|e| date < e) {
                result = result.merge(ValidationResult::invalid(format!(
                    "date {} is before {}",
                    date, earliest
                )));
            }
            if let Some(latest) = latest.filter(|l| date > l) {
                result = result.merge(ValidationResult::invalid(format!(
                    "date {} is after {}",
                    date, latest
                )));
            }
            result
        }
        // Type mismatches are reported by the type validator
        _ => ValidationResult::valid(),
    }
}

fn validate_identifier(text: &str, min_len: usize, max_len: usize, separators: &str) -> ValidationResult {
    let mut result = ValidationResult::valid();
    let len = text.chars().count();

    if len < min_len || len > max_len {
        let expected = if min_len == max_len {
            format!("exactly {}", min_len)
        } else {
            format!("between {} and {}", min_len, max_len)
        };
        result = result.merge(ValidationResult::invalid(format!(
            "'{}' must be {} characters long, got {}",
            text, expected, len
        )));
    }

    let mut invalid: Vec<char> = text
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && !separators.contains(*c))
        .collect();
    invalid.dedup();
    if !invalid.is_empty() {
        let listed: String = invalid.iter().map(|c| format!("{:?}", c)).collect::<Vec<_>>().join(", ");
        result = result.merge(ValidationResult::invalid(format!(
            "'{}' contains characters other than letters and digits: {}",
            text, listed
        )));
    }

    let edge_separator = text
        .chars()
        .next()
        .into_iter()
        .chain(text.chars().last())
        .any(|c| separators.contains(c));
    if edge_separator {
        result = result.merge(ValidationResult::invalid(format!(
            "'{}' must start and end with a letter or digit",
            text
        )));
    }

    result
}

fn validate_amount(amount: Decimal, max_decimals: u32) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if amount <= Decimal::ZERO {
        result = result.merge(ValidationResult::invalid(format!(
            "amount {} must be positive",
            amount
        )));
    }

    let places = amount.normalize().scale();
    if places > max_decimals {
        result = result.merge(ValidationResult::invalid(format!(
            "amount {} has {} decimal places, at most {} allowed",
            amount, places, max_decimals
        )));
    }

    result
}
