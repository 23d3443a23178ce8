//! CLI subcommands.

pub mod compare;
pub mod config;
pub mod evaluate;
pub mod parse;

use std::path::{Path, PathBuf};

use console::style;
use tracing::debug;

use invex_core::models::config::InvexConfig;
use invex_core::RunSummary;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invex")
        .join("config.json")
}

/// Load the explicit config file, else the default one, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<InvexConfig> {
    if let Some(path) = config_path {
        return Ok(InvexConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config from {}", default_path.display());
        Ok(InvexConfig::from_file(&default_path)?)
    } else {
        Ok(InvexConfig::default())
    }
}

/// Print a run summary with a per-field breakdown.
pub fn print_summary(summary: &RunSummary) {
    println!(
        "{} {}",
        style("Run").bold(),
        style(&summary.run).cyan().bold()
    );
    println!(
        "   {} documents, accuracy {}, mean CER {:.3}, exact documents {:.1}%",
        summary.documents,
        style(format!("{:.1}%", summary.accuracy * 100.0)).green(),
        summary.mean_cer,
        summary.exact_match_rate * 100.0
    );
    if summary.parse_failures > 0 {
        println!(
            "   {} documents could not be parsed",
            style(summary.parse_failures).red()
        );
    }

    println!(
        "   {:<16} {:>6} {:>8} {:>9} {:>9} {:>8} {:>6}",
        "field", "count", "missing", "accuracy", "mean CER", "recall", "F1"
    );
    for field in summary.fields.values() {
        println!(
            "   {:<16} {:>6} {:>8} {:>8.1}% {:>9.3} {:>8.3} {:>6.3}",
            field.field_name,
            field.count,
            field.not_found,
            field.accuracy * 100.0,
            field.mean_cer,
            field.recall,
            field.f1
        );
    }
}
