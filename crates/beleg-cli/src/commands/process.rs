//! Process command - extract a receipt from a single OCR text file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use beleg_core::{ExtractionResult, ReceiptPipeline, ReceiptStore, ReceiptType};

use super::{format_receipt_text, format_receipts_csv, short_id, Context, TypeArg};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// OCR text file
    #[arg(required = true)]
    input: PathBuf,

    /// Receipt type (default from config)
    #[arg(short = 't', long = "type", value_enum)]
    receipt_type: Option<TypeArg>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Do not store the receipt or check for duplicates
    #[arg(long)]
    no_save: bool,
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

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn run(args: ProcessArgs, ctx: &Context) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = ctx.load_config()?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());
    let text = fs::read_to_string(&args.input)?;

    let receipt_type = args
        .receipt_type
        .map(ReceiptType::from)
        .unwrap_or(config.pipeline.default_receipt_type);

    let pipeline = ReceiptPipeline::from_config(&config)?;
    let repo = if args.no_save {
        None
    } else {
        Some(ctx.open_repository(&config)?)
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Extracting receipt...");

    let result = pipeline.process(&text, receipt_type, repo.as_ref().map(|r| r as &dyn ReceiptStore));

    pb.finish_and_clear();

    if !result.success {
        anyhow::bail!(
            "Extraction failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(id) = result.existing_id.as_deref().filter(|_| result.duplicate) {
        eprintln!(
            "{} Already stored as {}, skipping extraction",
            style("ℹ").blue(),
            short_id(id)
        );
    }

    let output = format_result(&result, args.format)?;

    if let Some(output_path) = &args.output {
        super::ensure_parent(output_path)?;
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output.trim_end());
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// JSON renders the whole result; CSV and text render the receipt only.
pub fn format_result(result: &ExtractionResult, format: OutputFormat) -> anyhow::Result<String> {
    match (format, &result.data) {
        (OutputFormat::Json, _) => Ok(serde_json::to_string_pretty(result)?),
        (OutputFormat::Csv, Some(receipt)) => format_receipts_csv(std::slice::from_ref(receipt)),
        (OutputFormat::Text, Some(receipt)) => Ok(format_receipt_text(receipt)),
        (_, None) => Ok(String::new()),
    }
}
