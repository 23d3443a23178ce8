//! Comparison results and aggregated evaluation summaries.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvexError;

/// A model/prompt combination whose results are aggregated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub model: String,
    pub prompt: String,
}

impl RunKey {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.prompt)
    }
}

impl FromStr for RunKey {
    type Err = InvexError;

    /// Parse `model/prompt`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((model, prompt))
                if !model.is_empty() && !prompt.is_empty() && !prompt.contains('/') =>
            {
                Ok(Self::new(model, prompt))
            }
            _ => Err(InvexError::Config(format!(
                "invalid run '{}', expected model/prompt",
                s
            ))),
        }
    }
}

/// Outcome of comparing one extracted field against ground truth.
///
/// Never mutated after creation; re-evaluation produces a new result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    invoice_id: String,
    field_name: String,
    exact_match: bool,
    cer: f64,
    ground_truth_value: String,
    extracted_value: Option<String>,
    found: bool,
    valid: bool,
    error: Option<String>,
}

impl ComparisonResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        invoice_id: impl Into<String>,
        field_name: impl Into<String>,
        exact_match: bool,
        cer: f64,
        ground_truth_value: String,
        extracted_value: Option<String>,
        found: bool,
        valid: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            field_name: field_name.into(),
            exact_match,
            cer,
            ground_truth_value,
            extracted_value,
            found,
            valid,
            error,
        }
    }

    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn exact_match(&self) -> bool {
        self.exact_match
    }

    /// Error rate of the extracted text against the ground truth text.
    pub fn cer(&self) -> f64 {
        self.cer
    }

    /// Canonical rendering of the ground truth value.
    pub fn ground_truth_value(&self) -> &str {
        &self.ground_truth_value
    }

    /// Normalized extracted value, or the raw capture when it could not
    /// be normalized.
    pub fn extracted_value(&self) -> Option<&str> {
        self.extracted_value.as_deref()
    }

    /// Whether the parser located the field.
    pub fn found(&self) -> bool {
        self.found
    }

    /// Whether the extracted value passed validation.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Document-level failure reason, when the output could not be parsed.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Aggregated metrics of one field within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub field_name: String,
    pub count: usize,
    pub matches: usize,
    pub not_found: usize,
    pub accuracy: f64,
    pub mean_cer: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Aggregated metrics of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run: RunKey,

    /// Number of distinct documents scored.
    pub documents: usize,

    /// Documents whose output could not be parsed at all.
    pub parse_failures: usize,

    /// Mean exact match over every comparison.
    pub accuracy: f64,

    /// Mean error rate over every comparison.
    pub mean_cer: f64,

    /// Share of documents where every field matched.
    pub exact_match_rate: f64,

    pub fields: BTreeMap<String, FieldSummary>,
}

/// Summaries of several runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub runs: Vec<RunSummary>,
}

impl EvaluationSummary {
    /// Collect run summaries, ordered by run key.
    pub fn from_runs(runs: impl IntoIterator<Item = RunSummary>) -> Self {
        let mut runs: Vec<RunSummary> = runs.into_iter().collect();
        runs.sort_by(|a, b| a.run.cmp(&b.run));
        Self { runs }
    }

    pub fn get(&self, run: &RunKey) -> Option<&RunSummary> {
        self.runs.iter().find(|r| &r.run == run)
    }

    /// Runs ranked best first: higher accuracy, then lower mean error rate.
    pub fn compare(&self) -> Vec<&RunSummary> {
        let mut ranked: Vec<&RunSummary> = self.runs.iter().collect();
        ranked.sort_by(|a, b| rank(a, b));
        ranked
    }

    /// The top-ranked run.
    pub fn best(&self) -> Option<&RunSummary> {
        self.compare().into_iter().next()
    }
}

fn rank(a: &RunSummary, b: &RunSummary) -> Ordering {
    b.accuracy
        .total_cmp(&a.accuracy)
        .then_with(|| a.mean_cer.total_cmp(&b.mean_cer))
        .then_with(|| a.run.cmp(&b.run))
}
