//! Compare command - rank stored run summaries.

use std::path::PathBuf;

use clap::Args;
use console::style;

use invex_core::{ResultsStore, RunKey};

use super::{load_config, print_summary};

/// Arguments for the compare command.
#[derive(Args)]
pub struct CompareArgs {
    /// Runs to compare as model/prompt (default: all stored runs)
    runs: Vec<String>,

    /// Results directory (default: from config)
    #[arg(short, long)]
    results_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: CompareFormat,

    /// Show the per-field breakdown of every run
    #[arg(long)]
    detailed: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum CompareFormat {
    /// Ranked table
    Text,
    /// JSON summaries, best first
    Json,
}

pub async fn run(args: CompareArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = ResultsStore::new(
        args.results_dir
            .clone()
            .unwrap_or_else(|| config.evaluation.results_dir.clone()),
    );

    let runs = args
        .runs
        .iter()
        .map(|r| r.parse::<RunKey>())
        .collect::<Result<Vec<_>, _>>()?;

    let evaluation = store.load_evaluation(&runs)?;
    if evaluation.runs.is_empty() {
        anyhow::bail!("No stored runs found in {}", store.root().display());
    }

    let ranked = evaluation.compare();

    if let CompareFormat::Json = args.format {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    println!(
        "{:>4}  {:<32} {:>9} {:>9} {:>9} {:>9}",
        "rank", "run", "documents", "accuracy", "mean CER", "exact"
    );
    for (rank, summary) in ranked.iter().enumerate() {
        let line = format!(
            "{:>4}  {:<32} {:>9} {:>8.1}% {:>9.3} {:>8.1}%",
            rank + 1,
            summary.run.to_string(),
            summary.documents,
            summary.accuracy * 100.0,
            summary.mean_cer,
            summary.exact_match_rate * 100.0
        );
        if rank == 0 {
            println!("{}", style(line).green().bold());
        } else {
            println!("{}", line);
        }
    }

    if args.detailed {
        for summary in &ranked {
            println!();
            print_summary(summary);
        }
    }

    Ok(())
}
