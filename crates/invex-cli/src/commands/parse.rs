//! Parse command - extract fields from a single model output file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use invex_core::{ExtractedField, FieldOutputParser, OutputParser, ParsedDocument};

use super::load_config;

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Model output file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Report validation issues on stderr
    #[arg(long)]
    validate: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Parsing file: {}", args.input.display());

    let content = fs::read(&args.input)?;
    let parser = FieldOutputParser::from_config(&config)?;
    let document = parser
        .parse_bytes(&content)
        .map_err(|e| anyhow::anyhow!("Could not parse {}: {}", args.input.display(), e))?;

    if args.validate {
        let issues: Vec<String> = document
            .fields
            .values()
            .flat_map(|f| {
                f.validation_errors()
                    .iter()
                    .map(move |e| format!("{}: {}", f.field_name(), e))
            })
            .collect();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&document)?,
        OutputFormat::Csv => format_document_csv(&document)?,
        OutputFormat::Text => format_document_text(&document),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_document_csv(document: &ParsedDocument) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "field",
        "raw_value",
        "normalized_value",
        "is_valid",
        "source",
        "errors",
    ])?;

    for field in document.fields.values() {
        let source = field.source().map(|s| s.to_string()).unwrap_or_default();
        wtr.write_record([
            field.field_name(),
            field.raw_value().unwrap_or_default(),
            normalized(field).as_str(),
            if field.is_valid() { "true" } else { "false" },
            source.as_str(),
            field.validation_errors().join("; ").as_str(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_document_text(document: &ParsedDocument) -> String {
    let mut output = String::new();

    for field in document.fields.values() {
        let status = if field.is_valid() { "ok" } else { "invalid" };
        output.push_str(&format!(
            "{}: {} [{}]\n",
            field.field_name(),
            if field.is_found() { normalized(field) } else { "-".to_string() },
            status
        ));
        if let Some(source) = field.source() {
            output.push_str(&format!("  found by: {}\n", source));
        }
        for error in field.validation_errors() {
            output.push_str(&format!("  error: {}\n", error));
        }
    }

    let strategies: Vec<String> = document
        .strategies_tried
        .iter()
        .map(ToString::to_string)
        .collect();
    output.push_str(&format!("\nStrategies tried: {}\n", strategies.join(", ")));

    output
}

/// Normalized rendering, falling back to the raw capture.
fn normalized(field: &ExtractedField) -> String {
    field
        .normalized_value()
        .map(ToString::to_string)
        .or_else(|| field.raw_value().map(str::to_string))
        .unwrap_or_default()
}
