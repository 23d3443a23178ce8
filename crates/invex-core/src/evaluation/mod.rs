//! Evaluation of model outputs against ground truth.

pub mod compare;
pub mod metrics;
pub mod results;

pub use compare::{Comparator, character_error_rate, compare_total, word_error_rate};
pub use metrics::{summarize, summarize_run};
pub use results::ResultsStore;

use std::collections::HashSet;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::config::InvexConfig;
use crate::models::evaluation::{ComparisonResult, RunKey, RunSummary};
use crate::models::ground_truth::{GroundTruthRecord, GroundTruthSet};
use crate::parser::{FieldOutputParser, OutputParser, ParsedDocument};

/// Failure reason recorded for ground truth invoices with no model output.
pub const NO_MODEL_OUTPUT: &str = "no model output";

/// Text produced by a model for one invoice image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    pub invoice_id: String,
    /// Undecoded output; decoding failures are scored, not raised.
    pub content: Vec<u8>,
}

impl RawModelOutput {
    pub fn new(invoice_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            content: text.into().into_bytes(),
        }
    }

    pub fn from_bytes(invoice_id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            content,
        }
    }
}

/// Results and summary of one model/prompt run.
#[derive(Debug, Clone)]
pub struct RunEvaluation {
    pub results: Vec<ComparisonResult>,
    pub summary: RunSummary,
    /// Outputs whose invoice id is not in the ground truth.
    pub unmatched_outputs: Vec<String>,
    /// Ground truth invoices with no output.
    pub missing_outputs: Vec<String>,
    /// Invoice ids given more than once; only the first output is scored.
    pub duplicate_outputs: Vec<String>,
}

/// Drives parse and compare over a batch of documents.
#[derive(Debug, Clone)]
pub struct Evaluator<P = FieldOutputParser> {
    parser: P,
    comparator: Comparator,
    score_missing_outputs: bool,
}

impl Evaluator<FieldOutputParser> {
    /// Build the default parser and comparator from configuration.
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            FieldOutputParser::from_config(config)?,
            Comparator::new(config.comparison.clone()),
        )
        .with_score_missing_outputs(config.evaluation.score_missing_outputs))
    }
}

impl<P: OutputParser + Sync> Evaluator<P> {
    pub fn new(parser: P, comparator: Comparator) -> Self {
        Self {
            parser,
            comparator,
            score_missing_outputs: true,
        }
    }

    /// Score ground truth invoices that have no output as not found.
    pub fn with_score_missing_outputs(mut self, score: bool) -> Self {
        self.score_missing_outputs = score;
        self
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    /// Parse one output and compare it with its ground truth.
    ///
    /// An output that cannot be parsed is scored as not found for every
    /// field, with the failure reason recorded on each result.
    pub fn evaluate_document(
        &self,
        output: &RawModelOutput,
        truth: &GroundTruthRecord,
    ) -> Vec<ComparisonResult> {
        let specs = self.parser.fields();

        match self.parser.parse_bytes(&output.content) {
            Ok(document) => {
                self.comparator
                    .compare_document(&output.invoice_id, specs, &document, truth, None)
            }
            Err(e) => {
                warn!("Could not parse output for {}: {}", output.invoice_id, e);
                let reason = e.to_string();
                self.comparator.compare_document(
                    &output.invoice_id,
                    specs,
                    &ParsedDocument::not_found(specs),
                    truth,
                    Some(&reason),
                )
            }
        }
    }

    /// Evaluate a batch of outputs for one run.
    pub fn evaluate_run(
        &self,
        run: &RunKey,
        outputs: &[RawModelOutput],
        truth: &GroundTruthSet,
    ) -> RunEvaluation {
        self.evaluate_run_with_progress(run, outputs, truth, || {})
    }

    /// Like [`Self::evaluate_run`], calling `on_document` after each
    /// document is scored or skipped. The callback may run on worker
    /// threads.
    pub fn evaluate_run_with_progress<F>(
        &self,
        run: &RunKey,
        outputs: &[RawModelOutput],
        truth: &GroundTruthSet,
        on_document: F,
    ) -> RunEvaluation
    where
        F: Fn() + Sync,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut unique: Vec<&RawModelOutput> = Vec::with_capacity(outputs.len());
        let mut duplicate_outputs = Vec::new();
        for output in outputs {
            if seen.insert(output.invoice_id.as_str()) {
                unique.push(output);
            } else {
                warn!("Duplicate output for invoice {}, skipped", output.invoice_id);
                duplicate_outputs.push(output.invoice_id.clone());
                on_document();
            }
        }

        let score = |output: &&RawModelOutput| {
            let results = truth
                .get(&output.invoice_id)
                .map(|record| self.evaluate_document(output, record));
            on_document();
            (output.invoice_id.clone(), results)
        };

        #[cfg(feature = "parallel")]
        let scored: Vec<(String, Option<Vec<ComparisonResult>>)> = unique.par_iter().map(score).collect();

        #[cfg(not(feature = "parallel"))]
        let scored: Vec<(String, Option<Vec<ComparisonResult>>)> = unique.iter().map(score).collect();

        let mut results = Vec::new();
        let mut unmatched_outputs = Vec::new();
        for (invoice_id, scored) in scored {
            match scored {
                Some(document_results) => results.extend(document_results),
                None => {
                    warn!("No ground truth for output {}, skipped", invoice_id);
                    unmatched_outputs.push(invoice_id);
                }
            }
        }

        let missing_outputs: Vec<String> = truth
            .ids()
            .filter(|id| !seen.contains(id))
            .map(str::to_string)
            .collect();

        if self.score_missing_outputs {
            let specs = self.parser.fields();
            let empty = ParsedDocument::not_found(specs);
            for id in &missing_outputs {
                if let Some(record) = truth.get(id) {
                    results.extend(self.comparator.compare_document(
                        id,
                        specs,
                        &empty,
                        record,
                        Some(NO_MODEL_OUTPUT),
                    ));
                }
            }
        }

        let summary = summarize_run(run.clone(), &results);
        info!(
            "Evaluated {}: {} documents, accuracy {:.1}%, mean CER {:.3}",
            run,
            summary.documents,
            summary.accuracy * 100.0,
            summary.mean_cer
        );

        RunEvaluation {
            results,
            summary,
            unmatched_outputs,
            missing_outputs,
            duplicate_outputs,
        }
    }
}
