//! Receipts command - inspect and correct stored receipts.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use console::style;
use tracing::info;

use beleg_core::{ReceiptCategory, ReceiptData, ReceiptStore, ReceiptType, ReceiptUpdate};

use super::{format_receipt_text, opt, parse_category, resolve_receipt_id, short_id, Context, TypeArg};

/// Arguments for the receipts command.
#[derive(Args)]
pub struct ReceiptsArgs {
    #[command(subcommand)]
    command: ReceiptsCommand,
}

#[derive(Subcommand)]
enum ReceiptsCommand {
    /// List stored receipts, newest first
    List(ListArgs),

    /// Show one receipt
    Show {
        /// Receipt id or unambiguous prefix
        id: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete a receipt with its items
    Delete {
        /// Receipt id or unambiguous prefix
        id: String,
    },

    /// Correct fields of a receipt
    Update {
        /// Receipt id or unambiguous prefix
        id: String,

        /// Fields to change, e.g. '{"total_amount": "119.00", "address": {"city": "Köln"}}'
        #[arg(long, required = true)]
        json: String,
    },

    /// Mark a counterparty as verified
    VerifyCounterparty {
        /// Counterparty id
        id: String,

        /// Clear the flag instead
        #[arg(long)]
        unset: bool,
    },

    /// List verified counterparties
    Counterparties,
}

#[derive(Args)]
struct ListArgs {
    /// Only this category
    #[arg(long, value_parser = parse_category)]
    category: Option<ReceiptCategory>,

    /// Only this receipt type
    #[arg(short = 't', long = "type", value_enum)]
    receipt_type: Option<TypeArg>,

    /// First day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day, inclusive (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub fn run(args: ReceiptsArgs, ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let repo = ctx.open_repository(&config)?;

    match args.command {
        ReceiptsCommand::List(list_args) => list(&repo, list_args),
        ReceiptsCommand::Show { id, json } => {
            let id = resolve_receipt_id(&repo, &id)?;
            let receipt = repo
                .get(&id)?
                .ok_or_else(|| anyhow::anyhow!("Receipt not found: {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                print!("{}", format_receipt_text(&receipt));
            }
            Ok(())
        }
        ReceiptsCommand::Delete { id } => {
            let id = resolve_receipt_id(&repo, &id)?;
            repo.delete(&id)?;
            info!("Deleted receipt {}", id);
            println!("{} Deleted receipt {}", style("✓").green(), short_id(&id));
            Ok(())
        }
        ReceiptsCommand::Update { id, json } => {
            let id = resolve_receipt_id(&repo, &id)?;
            let changes: ReceiptUpdate = serde_json::from_str(&json)
                .map_err(|e| anyhow::anyhow!("Invalid update JSON: {}", e))?;
            if changes.is_empty() {
                anyhow::bail!("Nothing to update");
            }
            if !repo.update(&id, &changes)? {
                anyhow::bail!("Receipt not found: {}", id);
            }
            println!("{} Updated receipt {}", style("✓").green(), short_id(&id));
            Ok(())
        }
        ReceiptsCommand::VerifyCounterparty { id, unset } => {
            if !repo.set_counterparty_verified(&id, !unset)? {
                anyhow::bail!("Counterparty not found: {}", id);
            }
            let state = if unset { "unverified" } else { "verified" };
            println!("{} Counterparty {} marked {}", style("✓").green(), id, state);
            Ok(())
        }
        ReceiptsCommand::Counterparties => {
            for cp in repo.list_verified_counterparties()? {
                println!(
                    "{}  {:<32} {:<14} {}",
                    cp.id,
                    opt(&cp.name),
                    opt(&cp.vat_id),
                    cp.address.format()
                );
            }
            Ok(())
        }
    }
}

fn list(repo: &impl ReceiptStore, args: ListArgs) -> anyhow::Result<()> {
    let receipt_type = args.receipt_type.map(ReceiptType::from);

    let mut receipts = match (args.from.zip(args.to), args.category, receipt_type) {
        (Some((from, to)), _, _) => repo.find_by_period(from, to)?,
        (None, Some(category), _) => repo.find_by_category(category)?,
        (None, None, Some(kind)) => repo.find_by_type(kind)?,
        (None, None, None) => repo.list_all()?,
    };

    if let Some(category) = args.category {
        receipts.retain(|r| r.category == category);
    }
    if let Some(kind) = receipt_type {
        receipts.retain(|r| r.receipt_type == kind);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&receipts)?);
        return Ok(());
    }

    if receipts.is_empty() {
        println!("No receipts found.");
        return Ok(());
    }

    println!(
        "{:<12}  {:<10}  {:<8}  {:<17}  {:<28}  {:>10}  {:>8}",
        "ID", "DATUM", "TYP", "KATEGORIE", "GEGENPARTEI", "BRUTTO", "UST"
    );
    for receipt in &receipts {
        println!("{}", list_row(receipt));
    }
    println!("\n{} receipt(s)", receipts.len());

    Ok(())
}

fn list_row(receipt: &ReceiptData) -> String {
    let name: String = receipt
        .counterparty
        .as_ref()
        .and_then(|c| c.name.as_deref())
        .unwrap_or("")
        .chars()
        .take(28)
        .collect();

    format!(
        "{:<12}  {:<10}  {:<8}  {:<17}  {:<28}  {:>10}  {:>8}",
        short_id(&receipt.id),
        opt(&receipt.receipt_date),
        receipt.receipt_type.as_str(),
        receipt.category.as_str(),
        name,
        opt(&receipt.total_amount),
        opt(&receipt.vat_amount)
    )
}
