//! Persistence of evaluation results.
//!
//! Layout: `<root>/<model>/<prompt>/results.{json,csv}` plus
//! `summary.json` next to it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{InvexError, Result};
use crate::models::config::OutputFormat;
use crate::models::evaluation::{ComparisonResult, EvaluationSummary, RunKey, RunSummary};

const RESULTS_FILE: &str = "results";
const SUMMARY_FILE: &str = "summary.json";

/// File-backed store of per-run results and summaries.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    root: PathBuf,
}

impl ResultsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one run's files.
    pub fn run_dir(&self, run: &RunKey) -> PathBuf {
        self.root
            .join(path_component(&run.model))
            .join(path_component(&run.prompt))
    }

    /// Write per-document results in the given format.
    pub fn save_results(
        &self,
        run: &RunKey,
        results: &[ComparisonResult],
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let dir = self.run_dir(run);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.{}", RESULTS_FILE, format.extension()));

        match format {
            OutputFormat::Json => {
                fs::write(&path, serde_json::to_string_pretty(results)?)?;
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_path(&path)?;
                for result in results {
                    writer.serialize(result)?;
                }
                writer.flush()?;
            }
        }

        info!("Saved {} results for {} to {}", results.len(), run, path.display());
        Ok(path)
    }

    /// Read per-document results, JSON first, then CSV.
    pub fn load_results(&self, run: &RunKey) -> Result<Vec<ComparisonResult>> {
        let dir = self.run_dir(run);

        let json_path = dir.join(format!("{}.json", RESULTS_FILE));
        if json_path.exists() {
            let content = fs::read_to_string(&json_path)?;
            return Ok(serde_json::from_str(&content)?);
        }

        let csv_path = dir.join(format!("{}.csv", RESULTS_FILE));
        if csv_path.exists() {
            let mut reader = csv::Reader::from_path(&csv_path)?;
            return reader
                .deserialize()
                .collect::<std::result::Result<Vec<ComparisonResult>, csv::Error>>()
                .map_err(InvexError::from);
        }

        Err(InvexError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no stored results for {} in {}", run, dir.display()),
        )))
    }

    /// Write a run summary.
    pub fn save_summary(&self, summary: &RunSummary) -> Result<PathBuf> {
        let dir = self.run_dir(&summary.run);
        fs::create_dir_all(&dir)?;
        let path = dir.join(SUMMARY_FILE);
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        debug!("Saved summary for {} to {}", summary.run, path.display());
        Ok(path)
    }

    pub fn load_summary(&self, run: &RunKey) -> Result<RunSummary> {
        let content = fs::read_to_string(self.run_dir(run).join(SUMMARY_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Runs that have a stored summary, ordered by key.
    pub fn list_runs(&self) -> Result<Vec<RunKey>> {
        let mut runs = Vec::new();
        if !self.root.exists() {
            return Ok(runs);
        }

        for model in fs::read_dir(&self.root)? {
            let model = model?;
            if !model.file_type()?.is_dir() {
                continue;
            }
            for prompt in fs::read_dir(model.path())? {
                let prompt = prompt?;
                let summary_path = prompt.path().join(SUMMARY_FILE);
                if summary_path.is_file() {
                    let content = fs::read_to_string(&summary_path)?;
                    let summary: RunSummary = serde_json::from_str(&content)?;
                    runs.push(summary.run);
                }
            }
        }

        runs.sort();
        Ok(runs)
    }

    /// Stored summaries of the given runs, or of every stored run when
    /// `runs` is empty.
    pub fn load_evaluation(&self, runs: &[RunKey]) -> Result<EvaluationSummary> {
        let runs = if runs.is_empty() {
            self.list_runs()?
        } else {
            runs.to_vec()
        };

        let summaries = runs
            .iter()
            .map(|run| self.load_summary(run))
            .collect::<Result<Vec<_>>>()?;
        Ok(EvaluationSummary::from_runs(summaries))
    }
}

/// Make a model or prompt name safe to use as a single path component.
fn path_component(name: &str) -> String {
    let component: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();

    // Empty, `.` and `..` would resolve to the root or outside it.
    if component.chars().all(|c| c == '.') {
        "_".repeat(component.len().max(1))
    } else {
        component
    }
}
