//! Evaluate command - score a batch of model outputs against ground truth.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use invex_core::models::config::OutputFormat;
use invex_core::{Evaluator, GroundTruthSet, RawModelOutput, ResultsStore, RunKey};

use super::{load_config, print_summary};

/// Arguments for the evaluate command.
#[derive(Args)]
pub struct EvaluateArgs {
    /// Model output files or glob pattern; file stem is the invoice id
    #[arg(required = true)]
    input: String,

    /// Ground truth CSV file
    #[arg(short, long)]
    ground_truth: PathBuf,

    /// Model name
    #[arg(short, long)]
    model: String,

    /// Prompt name
    #[arg(short, long)]
    prompt: String,

    /// Results directory (default: from config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Results file format (default: from config)
    #[arg(short, long, value_enum)]
    format: Option<ResultFormat>,

    /// Print the summary without storing results
    #[arg(long)]
    no_save: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ResultFormat {
    /// JSON results
    Json,
    /// CSV results
    Csv,
}

impl From<ResultFormat> for OutputFormat {
    fn from(format: ResultFormat) -> Self {
        match format {
            ResultFormat::Json => OutputFormat::Json,
            ResultFormat::Csv => OutputFormat::Csv,
        }
    }
}

pub async fn run(args: EvaluateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let run = RunKey::new(&args.model, &args.prompt);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} model outputs for {}",
        style("ℹ").blue(),
        files.len(),
        style(&run).cyan()
    );

    let truth = GroundTruthSet::from_csv(
        &args.ground_truth,
        &config.fields,
        &config.evaluation.id_column,
    )?;

    let mut outputs = Vec::with_capacity(files.len());
    for path in &files {
        let Some(invoice_id) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!("Skipping file with no usable name: {}", path.display());
            continue;
        };
        outputs.push(RawModelOutput::from_bytes(invoice_id, fs::read(path)?));
    }

    let evaluator = Evaluator::from_config(&config)?;

    let pb = ProgressBar::new(outputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents")?
            .progress_chars("=>-"),
    );

    let evaluation = {
        let pb = pb.clone();
        let run = run.clone();
        tokio::task::spawn_blocking(move || {
            evaluator.evaluate_run_with_progress(&run, &outputs, &truth, || pb.inc(1))
        })
        .await?
    };

    pb.finish_with_message("Complete");

    println!();
    print_summary(&evaluation.summary);

    if !evaluation.unmatched_outputs.is_empty() {
        println!();
        println!(
            "{} {} outputs have no ground truth: {}",
            style("⚠").yellow(),
            evaluation.unmatched_outputs.len(),
            evaluation.unmatched_outputs.join(", ")
        );
    }
    if !evaluation.duplicate_outputs.is_empty() {
        println!(
            "{} {} outputs share an invoice id with an earlier file and were skipped: {}",
            style("⚠").yellow(),
            evaluation.duplicate_outputs.len(),
            evaluation.duplicate_outputs.join(", ")
        );
    }
    if !evaluation.missing_outputs.is_empty() {
        println!(
            "{} {} ground truth invoices have no output{}",
            style("⚠").yellow(),
            evaluation.missing_outputs.len(),
            if config.evaluation.score_missing_outputs {
                " (scored as not found)"
            } else {
                ""
            }
        );
    }

    if !args.no_save {
        let store = ResultsStore::new(
            args.output_dir
                .clone()
                .unwrap_or_else(|| config.evaluation.results_dir.clone()),
        );
        let format = args
            .format
            .map(OutputFormat::from)
            .unwrap_or(config.evaluation.output_format);

        let results_path = store.save_results(&run, &evaluation.results, format)?;
        let summary_path = store.save_summary(&evaluation.summary)?;

        println!();
        println!(
            "{} Results written to {}",
            style("✓").green(),
            results_path.display()
        );
        debug!("Summary written to {}", summary_path.display());
    }

    println!();
    println!(
        "{} Evaluated {} documents in {:?}",
        style("✓").green(),
        evaluation.summary.documents,
        start.elapsed()
    );

    Ok(())
}
