//! Configuration structures for the evaluation pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{InvexError, Result};
use crate::models::field::{FieldFormat, FieldSpec};

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Fields to extract and score, in output order.
    pub fields: Vec<FieldSpec>,

    /// Output parser configuration.
    pub parser: ParserConfig,

    /// Ground truth comparison configuration.
    pub comparison: ComparisonConfig,

    /// Batch evaluation configuration.
    pub evaluation: EvaluationConfig,
}

impl Default for InvexConfig {
    fn default() -> Self {
        Self {
            fields: vec![FieldSpec::work_order(), FieldSpec::total()],
            parser: ParserConfig::default(),
            comparison: ComparisonConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

/// Output parser configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Characters searched after a label in free prose.
    pub proximity_window: usize,

    /// Accept single-quoted pseudo-JSON.
    pub lenient_json: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            proximity_window: 80,
            lenient_json: true,
        }
    }
}

/// How the amount tolerance boundary is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceBound {
    /// `|a - b| < epsilon`
    Exclusive,
    /// `|a - b| <= epsilon`
    Inclusive,
}

/// Granularity of the error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CerMode {
    /// Edit distance over characters.
    Character,
    /// Edit distance over whitespace-separated words.
    Word,
}

/// Ground truth comparison configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Tolerance for amount fields.
    pub amount_epsilon: Decimal,

    /// Whether a difference equal to the epsilon still matches.
    pub tolerance_bound: ToleranceBound,

    /// Error rate granularity.
    pub cer_mode: CerMode,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::new(1, 2),
            tolerance_bound: ToleranceBound::Exclusive,
            cer_mode: CerMode::Character,
        }
    }
}

/// Results file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Batch evaluation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Ground truth column holding the invoice id.
    pub id_column: String,

    /// Score ground truth invoices with no model output as not found.
    pub score_missing_outputs: bool,

    /// Root directory for stored results.
    pub results_dir: PathBuf,

    /// Format of stored per-document results.
    pub output_format: OutputFormat,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            id_column: "Invoice".to_string(),
            score_missing_outputs: true,
            results_dir: PathBuf::from("results"),
            output_format: OutputFormat::Json,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(InvexError::Config("no fields configured".to_string()));
        }

        let mut seen = HashSet::new();
        for spec in &self.fields {
            if spec.name.trim().is_empty() {
                return Err(InvexError::Config("field name must not be empty".to_string()));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(InvexError::Config(format!(
                    "duplicate field name '{}'",
                    spec.name
                )));
            }
            if spec.synonyms.iter().any(|s| s.trim().is_empty()) {
                return Err(InvexError::Config(format!(
                    "field '{}' has an empty synonym",
                    spec.name
                )));
            }
            if let FieldFormat::Identifier {
                min_len, max_len, ..
            } = &spec.format
            {
                if *min_len == 0 || min_len > max_len {
                    return Err(InvexError::Config(format!(
                        "field '{}' has invalid length bounds {}..={}",
                        spec.name, min_len, max_len
                    )));
                }
            }
            if let FieldFormat::Date {
                earliest: Some(earliest),
                latest: Some(latest),
            } = &spec.format
            {
                if earliest > latest {
                    return Err(InvexError::Config(format!(
                        "field '{}' has earliest date after latest date",
                        spec.name
                    )));
                }
            }
        }

        if self.parser.proximity_window == 0 {
            return Err(InvexError::Config(
                "parser.proximity_window must be greater than zero".to_string(),
            ));
        }
        if self.comparison.amount_epsilon.is_sign_negative() {
            return Err(InvexError::Config(
                "comparison.amount_epsilon must not be negative".to_string(),
            ));
        }
        if self.evaluation.id_column.trim().is_empty() {
            return Err(InvexError::Config(
                "evaluation.id_column must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up a configured field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = InvexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.comparison.amount_epsilon.to_string(), "0.01");
        assert_eq!(config.parser.proximity_window, 80);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"comparison": {"tolerance_bound": "inclusive"}}"#).unwrap();
        assert_eq!(config.comparison.tolerance_bound, ToleranceBound::Inclusive);
        assert_eq!(config.comparison.cer_mode, CerMode::Character);
        assert_eq!(config.fields, InvexConfig::default().fields);
    }

    #[test]
    fn test_numeric_epsilon_accepted() {
        let config: InvexConfig =
            serde_json::from_str(r#"{"comparison": {"amount_epsilon": 0.05}}"#).unwrap();
        assert_eq!(config.comparison.amount_epsilon, Decimal::new(5, 2));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = InvexConfig::default();
        config.fields.push(FieldSpec::total());
        assert!(matches!(config.validate(), Err(InvexError::Config(_))));

        let mut config = InvexConfig::default();
        config.parser.proximity_window = 0;
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.comparison.amount_epsilon = Decimal::new(-1, 2);
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.fields[0] = FieldSpec::work_order().with_synonyms([" "]);
        assert!(config.validate().is_err());

        let mut config = InvexConfig::default();
        config.fields = vec![FieldSpec::new(
            "ref",
            "Reference",
            FieldFormat::Identifier {
                min_len: 6,
                max_len: 4,
                separators: String::new(),
            },
        )];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = InvexConfig::default();
        config.fields.push(FieldSpec::invoice_date().with_required(false));
        config.evaluation.output_format = OutputFormat::Csv;
        config.save(&path).unwrap();

        let loaded = InvexConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.field("date").is_some());
    }
}
