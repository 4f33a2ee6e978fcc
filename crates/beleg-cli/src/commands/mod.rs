//! Subcommands and the state they share.

pub mod batch;
pub mod config;
pub mod process;
pub mod receipts;
pub mod report;

use std::path::{Path, PathBuf};

use tracing::debug;

use beleg_core::receipt::rules::format_german_amount;
use beleg_core::{BelegConfig, ReceiptCategory, ReceiptData, ReceiptStore, ReceiptType, Repository};

/// Global options resolved once at start-up.
pub struct Context {
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
}

impl Context {
    pub fn new(config_path: Option<PathBuf>, db_path: Option<PathBuf>) -> Self {
        Self { config_path, db_path }
    }

    /// The explicit `--config` path, or the platform default.
    pub fn config_path(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(default_config_path)
    }

    /// Config file (if present) with `BELEG_*` overrides applied.
    ///
    /// An explicit `--config` path must exist; the default one may not.
    pub fn load_config(&self) -> anyhow::Result<BelegConfig> {
        let path = self.config_path();
        let config = if path.exists() {
            debug!("Loading configuration from {}", path.display());
            BelegConfig::from_file(&path)?
        } else if self.config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        } else {
            BelegConfig::default()
        };

        let mut config = config.with_env_overrides();
        if config.pipeline.debug_artifacts && config.pipeline.debug_dir.is_none() {
            config.pipeline.debug_dir = Some(default_debug_dir());
        }
        config.ensure_valid()?;
        Ok(config)
    }

    /// Database from `--db`, the config, or the platform default, in that order.
    pub fn db_path(&self, config: &BelegConfig) -> PathBuf {
        self.db_path
            .clone()
            .or_else(|| config.storage.db_path.clone())
            .unwrap_or_else(default_db_path)
    }

    pub fn open_repository(&self, config: &BelegConfig) -> anyhow::Result<Repository> {
        let path = self.db_path(config);
        debug!("Opening receipt database {}", path.display());
        Ok(Repository::open(&path)?)
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beleg")
        .join("config.json")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("beleg.db")
}

pub fn default_debug_dir() -> PathBuf {
    data_dir().join("debug")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beleg")
}

/// Receipt type as a command-line value.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum TypeArg {
    /// Incoming receipt, input VAT
    Purchase,
    /// Outgoing receipt, output VAT
    Sale,
}

impl From<TypeArg> for ReceiptType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Purchase => ReceiptType::Purchase,
            TypeArg::Sale => ReceiptType::Sale,
        }
    }
}

/// Strict category parser for command-line values.
pub fn parse_category(s: &str) -> Result<ReceiptCategory, String> {
    ReceiptCategory::ALL
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| {
            let names: Vec<_> = ReceiptCategory::ALL.iter().map(|c| c.as_str()).collect();
            format!("unknown category '{}', expected one of: {}", s, names.join(", "))
        })
}

/// Resolve a full receipt id or an unambiguous prefix of one.
pub fn resolve_receipt_id(repo: &Repository, id: &str) -> anyhow::Result<String> {
    if repo.exists(id)? {
        return Ok(id.to_string());
    }

    let matches: Vec<String> = repo
        .list_all()?
        .into_iter()
        .map(|r| r.id)
        .filter(|candidate| candidate.starts_with(id))
        .collect();

    match matches.as_slice() {
        [only] => Ok(only.clone()),
        [] => anyhow::bail!("Receipt not found: {}", id),
        _ => anyhow::bail!("Receipt id prefix '{}' is ambiguous ({} matches)", id, matches.len()),
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

pub fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

/// Human-readable rendering of one receipt.
pub fn format_receipt_text(receipt: &ReceiptData) -> String {
    let mut output = String::new();

    output.push_str(&format!("Beleg: {}\n", receipt.id));
    output.push_str(&format!("Typ: {}\n", receipt.receipt_type));
    if let Some(number) = &receipt.receipt_number {
        output.push_str(&format!("Nummer: {}\n", number));
    }
    if let Some(date) = receipt.receipt_date {
        output.push_str(&format!("Datum: {}\n", date.format("%d.%m.%Y")));
    }
    output.push_str(&format!("Kategorie: {}\n", receipt.category));

    if let Some(cp) = &receipt.counterparty {
        let label = if receipt.is_purchase() { "Lieferant" } else { "Kunde" };
        output.push('\n');
        output.push_str(&format!("{}:\n", label));
        if let Some(name) = &cp.name {
            output.push_str(&format!("  {}\n", name));
        }
        if !cp.address.is_empty() {
            output.push_str(&format!("  {}\n", cp.address.format()));
        }
        if let Some(vat_id) = &cp.vat_id {
            output.push_str(&format!("  USt-IdNr.: {}\n", vat_id));
        }
        if let Some(tax_number) = &cp.tax_number {
            output.push_str(&format!("  Steuernummer: {}\n", tax_number));
        }
        if cp.verified {
            output.push_str("  (verifiziert)\n");
        }
    }

    if !receipt.items.is_empty() {
        output.push_str("\nPositionen:\n");
        for item in &receipt.items {
            output.push_str(&format!(
                "  {:>2}. {:<36} {:>10}\n",
                item.position.unwrap_or_default(),
                item.description,
                item.total_price.map(format_german_amount).unwrap_or_default()
            ));
        }
    }

    output.push_str("\nBeträge:\n");
    let eur = |amount: Option<_>| amount.map(format_german_amount).unwrap_or_else(|| "-".into());
    output.push_str(&format!("  Brutto: {} EUR\n", eur(receipt.total_amount)));
    if receipt.net_amount().is_some() {
        output.push_str(&format!("  Netto:  {} EUR\n", eur(receipt.net_amount())));
    }
    match receipt.vat_percentage {
        Some(pct) => output.push_str(&format!(
            "  USt {} %: {} EUR\n",
            pct.normalize(),
            eur(receipt.vat_amount)
        )),
        None => output.push_str(&format!("  USt:    {} EUR\n", eur(receipt.vat_amount))),
    }
    for split in &receipt.vat_splits {
        output.push_str(&format!(
            "    davon {} %: {} EUR\n",
            opt(&split.vat_rate.map(|r| r.normalize())),
            eur(split.vat_amount)
        ));
    }

    output
}

pub const CSV_HEADER: [&str; 11] = [
    "id",
    "receipt_type",
    "receipt_number",
    "receipt_date",
    "counterparty",
    "vat_id",
    "category",
    "total_amount",
    "vat_percentage",
    "vat_amount",
    "net_amount",
];

pub fn csv_record(receipt: &ReceiptData) -> [String; 11] {
    let cp = receipt.counterparty.as_ref();
    [
        receipt.id.clone(),
        receipt.receipt_type.to_string(),
        opt(&receipt.receipt_number),
        opt(&receipt.receipt_date),
        cp.and_then(|c| c.name.clone()).unwrap_or_default(),
        cp.and_then(|c| c.vat_id.clone()).unwrap_or_default(),
        receipt.category.to_string(),
        opt(&receipt.total_amount),
        opt(&receipt.vat_percentage),
        opt(&receipt.vat_amount),
        opt(&receipt.net_amount()),
    ]
}

/// Receipts as CSV with a header row.
pub fn format_receipts_csv(receipts: &[ReceiptData]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for receipt in receipts {
        wtr.write_record(csv_record(receipt))?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

/// Ensure a directory for `path` exists.
pub fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        assert_eq!(parse_category("Software"), Ok(ReceiptCategory::Software));
        assert!(parse_category("hardware").unwrap_err().contains("expected one of"));
    }

    #[test]
    fn test_csv_has_header_and_row() {
        let mut receipt = ReceiptData::new("Kassenbon", ReceiptType::Purchase);
        receipt.receipt_number = Some("A-1".into());
        let csv = format_receipts_csv(&[receipt]).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,receipt_type"));
        assert!(lines[1].contains(",purchase,A-1,"));
    }

    #[test]
    fn test_text_uses_german_amounts() {
        let mut receipt = ReceiptData::new("Kassenbon", ReceiptType::Sale);
        receipt.total_amount = "1234.56".parse().ok();
        let text = format_receipt_text(&receipt);
        assert!(text.contains("Brutto: 1.234,56 EUR"));
        assert!(text.contains("USt:    - EUR"));
    }
}
