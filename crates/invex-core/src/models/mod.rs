//! Data models shared across the pipeline.

pub mod config;
pub mod evaluation;
pub mod field;
pub mod ground_truth;

pub use config::{
    CerMode, ComparisonConfig, EvaluationConfig, InvexConfig, OutputFormat, ParserConfig,
    ToleranceBound,
};
pub use evaluation::{ComparisonResult, EvaluationSummary, FieldSummary, RunKey, RunSummary};
pub use field::{ExtractedField, FieldFormat, FieldSpec, FieldValue, ParseStrategy, ValueType};
pub use ground_truth::{GroundTruthRecord, GroundTruthSet};
