//! CLI application for German receipt extraction and UStVA reporting.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, process, receipts, report, Context};

/// Beleg - Extract structured data from German receipts and prepare VAT returns
#[derive(Parser)]
#[command(name = "beleg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the receipt database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a receipt from an OCR text file
    Process(process::ProcessArgs),

    /// Extract receipts from multiple OCR text files
    Batch(batch::BatchArgs),

    /// Inspect and correct stored receipts
    Receipts(receipts::ReceiptsArgs),

    /// Generate a UStVA (VAT return) report
    Report(report::ReportArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = Context::new(cli.config, cli.db);

    match cli.command {
        Commands::Process(args) => process::run(args, &ctx),
        Commands::Batch(args) => batch::run(args, &ctx),
        Commands::Receipts(args) => receipts::run(args, &ctx),
        Commands::Report(args) => report::run(args, &ctx),
        Commands::Config(args) => config::run(args, &ctx),
    }
}
