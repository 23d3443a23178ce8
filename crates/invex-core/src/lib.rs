//! Core library for evaluating invoice field extraction by vision-language
//! models.
//!
//! This crate provides:
//! - Field normalization and validation (work order numbers, totals, dates)
//! - Parsing of free-form model output into structured fields
//! - Ground truth loading and validation
//! - Comparison, error rates and aggregated metrics per model/prompt run
//! - Storage of evaluation results

pub mod error;
pub mod evaluation;
pub mod fields;
pub mod models;
pub mod parser;

pub use error::{GroundTruthError, InvexError, NormalizationError, ParsingError, Result};
pub use evaluation::{Comparator, Evaluator, RawModelOutput, ResultsStore, RunEvaluation};
pub use fields::{ValidationResult, Validator, normalize};
pub use models::config::InvexConfig;
pub use models::evaluation::{ComparisonResult, EvaluationSummary, RunKey, RunSummary};
pub use models::field::{ExtractedField, FieldFormat, FieldSpec, FieldValue, ParseStrategy};
pub use models::ground_truth::{GroundTruthRecord, GroundTruthSet};
pub use parser::{FieldOutputParser, OutputParser, ParsedDocument};
