//! Batch processing command for multiple OCR text files.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use beleg_core::{ExtractionResult, ReceiptPipeline, ReceiptStore, ReceiptType};

use super::process::{format_result, OutputFormat};
use super::{opt, Context, TypeArg};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for OCR text files, e.g. "scans/*.txt"
    #[arg(required = true)]
    input: String,

    /// Receipt type for every file (default from config)
    #[arg(short = 't', long = "type", value_enum)]
    receipt_type: Option<TypeArg>,

    /// Write one result file per input into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also write a summary CSV
    #[arg(long)]
    summary: bool,

    /// Do not store receipts or check for duplicates
    #[arg(long)]
    no_save: bool,

    /// Stop at the first failed file
    #[arg(long)]
    fail_fast: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    result: ExtractionResult,
}

pub fn run(args: BatchArgs, ctx: &Context) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = ctx.load_config()?;

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            ext.eq_ignore_ascii_case("txt")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!("{} Found {} files to process", style("ℹ").blue(), files.len());

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

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
    let store = repo.as_ref().map(|r| r as &dyn ReceiptStore);

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    // Sequential: the inference endpoint serves one request at a time.
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        overall_pb.set_message(file_label(&path));

        let result = match fs::read_to_string(&path) {
            Ok(text) => pipeline.process(&text, receipt_type, store),
            Err(e) => ExtractionResult::failed(format!("cannot read file: {}", e), 0),
        };

        if !result.success {
            let message = result.error_message.as_deref().unwrap_or("unknown error");
            warn!("Failed to process {}: {}", path.display(), message);
            if args.fail_fast {
                overall_pb.abandon();
                anyhow::bail!("Processing {} failed: {}", path.display(), message);
            }
        }

        if let Some(output_dir) = &args.output_dir {
            if result.success {
                let output_path =
                    output_dir.join(format!("{}.{}", file_label(&path), args.format.extension()));
                fs::write(&output_path, format_result(&result, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }

        results.push(FileResult { path, result });
        overall_pb.inc(1);
    }

    overall_pb.finish_with_message("Complete");

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed = results.iter().filter(|r| !r.result.success).count();
    let duplicates = results.iter().filter(|r| r.result.duplicate).count();
    let extracted = results.len() - failed - duplicates;

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    eprintln!("  Extracted:  {}", style(extracted).green());
    eprintln!("  Duplicates: {}", style(duplicates).yellow());
    eprintln!("  Failed:     {}", style(failed).red());

    for file in results.iter().filter(|r| !r.result.success) {
        eprintln!(
            "  {} {}: {}",
            style("✗").red(),
            file.path.display(),
            file.result.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("receipt")
        .to_string()
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "file",
        "status",
        "receipt_id",
        "receipt_date",
        "counterparty",
        "total_amount",
        "vat_amount",
        "processing_time_ms",
        "error",
    ])?;

    for file in results {
        let result = &file.result;
        let status = match (result.success, result.duplicate) {
            (true, false) => "ok",
            (true, true) => "duplicate",
            (false, _) => "error",
        };
        let receipt = result.data.as_ref();
        let id = receipt
            .map(|r| r.id.clone())
            .or_else(|| result.existing_id.clone())
            .unwrap_or_default();

        wtr.write_record([
            file.path.display().to_string(),
            status.to_string(),
            id,
            receipt.map(|r| opt(&r.receipt_date)).unwrap_or_default(),
            receipt
                .and_then(|r| r.counterparty.as_ref())
                .and_then(|c| c.name.clone())
                .unwrap_or_default(),
            receipt.map(|r| opt(&r.total_amount)).unwrap_or_default(),
            receipt.map(|r| opt(&r.vat_amount)).unwrap_or_default(),
            result.processing_time_ms.to_string(),
            result.error_message.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
