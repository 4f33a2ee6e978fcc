//! Report command - UStVA over stored receipts.

use chrono::{Local, NaiveDate};
use clap::Args;

use beleg_core::{generate_ustva, Quarter, ReceiptStore};

use super::Context;

/// Arguments for the report command.
#[derive(Args)]
pub struct ReportArgs {
    /// Quarter, e.g. 2024-Q1 (default: current quarter)
    #[arg(short, long, conflicts_with_all = ["from", "to"])]
    quarter: Option<Quarter>,

    /// First day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Print JSON instead of the text report
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReportArgs, ctx: &Context) -> anyhow::Result<()> {
    let (start, end) = match (args.quarter, args.from.zip(args.to)) {
        (Some(quarter), _) => (quarter.start(), quarter.end()),
        (None, Some((from, to))) => (from, to),
        (None, None) => {
            let quarter = Quarter::containing(Local::now().date_naive());
            (quarter.start(), quarter.end())
        }
    };

    if start > end {
        anyhow::bail!("Period start {} is after its end {}", start, end);
    }

    let config = ctx.load_config()?;
    let repo = ctx.open_repository(&config)?;

    let receipts = repo.find_by_period(start, end)?;
    let report = generate_ustva(&receipts, start, end);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        println!("{}", report.summary());
    }

    Ok(())
}
