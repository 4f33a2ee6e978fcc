//! Umsatzsteuer-Voranmeldung (UStVA): per-rate input and output VAT.
//!
//! Purchases carry input tax (Vorsteuer) the business reclaims, sales carry
//! output tax (Umsatzsteuer) it remits. The net liability is output minus
//! input: positive means a payment to the Finanzamt, negative a refund.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::models::receipt::{ReceiptData, ReceiptType};

/// Line key for receipts without a VAT rate.
pub const UNKNOWN_RATE: &str = "unknown";

const WIDTH: usize = 52;

/// Round half away from zero to cents, always with two decimal places.
fn cents(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Totals for one VAT rate, split by purchase and sale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UstvaLineItem {
    /// Normalized rate; zero for the unknown-rate line.
    pub vat_rate: Decimal,
    pub purchase_net: Decimal,
    pub purchase_vat: Decimal,
    pub purchase_count: usize,
    pub sale_net: Decimal,
    pub sale_vat: Decimal,
    pub sale_count: usize,
}

impl UstvaLineItem {
    fn new(vat_rate: Decimal) -> Self {
        Self {
            vat_rate,
            ..Default::default()
        }
    }

    /// Output VAT minus input VAT at this rate.
    pub fn net_liability(&self) -> Decimal {
        self.sale_vat - self.purchase_vat
    }

    fn add(&mut self, receipt_type: ReceiptType, net: Decimal, vat: Decimal) {
        match receipt_type {
            ReceiptType::Purchase => {
                self.purchase_net += net;
                self.purchase_vat += vat;
                self.purchase_count += 1;
            }
            ReceiptType::Sale => {
                self.sale_net += net;
                self.sale_vat += vat;
                self.sale_count += 1;
            }
        }
    }

    fn round(&mut self) {
        self.purchase_net = cents(self.purchase_net);
        self.purchase_vat = cents(self.purchase_vat);
        self.sale_net = cents(self.sale_net);
        self.sale_vat = cents(self.sale_vat);
    }
}

/// UStVA figures for a reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UstvaReport {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Keyed by normalized rate ("19", "7", "5.5") or [`UNKNOWN_RATE`].
    pub lines: BTreeMap<String, UstvaLineItem>,
    /// Receipts left out: undated, outside the period, or without VAT.
    pub skipped_count: usize,
}

impl UstvaReport {
    pub fn new(period_start: NaiveDate, period_end: NaiveDate) -> Self {
        Self {
            period_start,
            period_end,
            lines: BTreeMap::new(),
            skipped_count: 0,
        }
    }

    pub fn line(&self, rate: &str) -> Option<&UstvaLineItem> {
        self.lines.get(rate)
    }

    /// Vorsteuer over all rates.
    pub fn total_input_vat(&self) -> Decimal {
        cents(self.lines.values().map(|l| l.purchase_vat).sum())
    }

    /// Umsatzsteuer over all rates.
    pub fn total_output_vat(&self) -> Decimal {
        cents(self.lines.values().map(|l| l.sale_vat).sum())
    }

    /// Output minus input. Positive: payment due; negative: refund.
    pub fn net_liability(&self) -> Decimal {
        self.total_output_vat() - self.total_input_vat()
    }

    pub fn total_purchase_net(&self) -> Decimal {
        cents(self.lines.values().map(|l| l.purchase_net).sum())
    }

    pub fn total_sale_net(&self) -> Decimal {
        cents(self.lines.values().map(|l| l.sale_net).sum())
    }

    /// Receipts that contributed to a line.
    pub fn total_receipts(&self) -> usize {
        self.lines.values().map(|l| l.purchase_count + l.sale_count).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let lines: serde_json::Map<String, serde_json::Value> = self
            .lines
            .iter()
            .map(|(rate, line)| {
                let mut value = json!(line);
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("net_liability".into(), json!(line.net_liability()));
                }
                (rate.clone(), value)
            })
            .collect();

        json!({
            "period_start": self.period_start,
            "period_end": self.period_end,
            "total_receipts": self.total_receipts(),
            "skipped_count": self.skipped_count,
            "total_purchase_net": self.total_purchase_net(),
            "total_input_vat": self.total_input_vat(),
            "total_sale_net": self.total_sale_net(),
            "total_output_vat": self.total_output_vat(),
            "net_liability": self.net_liability(),
            "lines": lines,
        })
    }

    /// Fixed-width text report with the labels of the UStVA form.
    pub fn summary(&self) -> String {
        let thin = "─".repeat(WIDTH);
        let thick = "═".repeat(WIDTH);
        let frame = "=".repeat(WIDTH);

        let mut out = vec![
            frame.clone(),
            format!("  UStVA: {} bis {}", self.period_start, self.period_end),
            frame.clone(),
            format!("  Belege gesamt       : {}", self.total_receipts()),
            format!("  Übersprungen        : {}", self.skipped_count),
        ];

        if !self.lines.is_empty() {
            out.push(thin);
            for (rate, line) in &self.lines {
                let label = if rate == UNKNOWN_RATE { "unbekannt" } else { rate.as_str() };
                out.push(format!("  USt-Satz {} %", label));
                out.push("    Einkauf (Vorsteuer)".to_string());
                out.push(format!(
                    "      Nettobetrag    : {} EUR  ({} Belege)",
                    money(line.purchase_net),
                    line.purchase_count
                ));
                out.push(format!("      Vorsteuer      : {} EUR", money(line.purchase_vat)));
                out.push("    Verkauf (Umsatzsteuer)".to_string());
                out.push(format!(
                    "      Nettobetrag    : {} EUR  ({} Belege)",
                    money(line.sale_net),
                    line.sale_count
                ));
                out.push(format!("      Umsatzsteuer   : {} EUR", money(line.sale_vat)));
                out.push(format!("      Saldo          : {} EUR", signed_money(line.net_liability())));
            }
        }

        let liability = self.net_liability();
        let outcome = if liability > Decimal::ZERO {
            format!("{} EUR  (Zahllast an das Finanzamt)", money(liability))
        } else if liability < Decimal::ZERO {
            format!("{} EUR  (Erstattung vom Finanzamt)", money(liability.abs()))
        } else {
            format!("{} EUR  (ausgeglichen)", money(Decimal::ZERO))
        };

        out.extend([
            thick.clone(),
            format!("  Gesamt Vorsteuer    : {} EUR", money(self.total_input_vat())),
            format!("  Gesamt Umsatzsteuer : {} EUR", money(self.total_output_vat())),
            thick,
            format!("  Zahllast / Erstatt. : {}", outcome),
            frame,
        ]);

        out.join("\n")
    }
}

fn money(value: Decimal) -> String {
    format!("{:>10}", format!("{:.2}", value))
}

fn signed_money(value: Decimal) -> String {
    let text = if value > Decimal::ZERO {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    };
    format!("{:>10}", text)
}

/// Aggregate `receipts` dated within `[start, end]` into a UStVA report.
///
/// Receipts without a date, outside the period, or without a positive VAT
/// amount are counted as skipped. Amounts are rounded to cents as they are
/// added and once more at the end.
pub fn generate_ustva<'a, I>(receipts: I, start: NaiveDate, end: NaiveDate) -> UstvaReport
where
    I: IntoIterator<Item = &'a ReceiptData>,
{
    let mut report = UstvaReport::new(start, end);

    for receipt in receipts {
        let in_period = receipt.receipt_date.is_some_and(|d| d >= start && d <= end);
        let vat = receipt.vat_amount.filter(|v| *v > Decimal::ZERO);

        let (true, Some(vat)) = (in_period, vat) else {
            report.skipped_count += 1;
            continue;
        };

        let (key, rate) = match receipt.vat_percentage {
            Some(pct) => {
                let rate = pct.normalize();
                (rate.to_string(), rate)
            }
            None => (UNKNOWN_RATE.to_string(), Decimal::ZERO),
        };

        let net = cents(receipt.net_amount().unwrap_or(Decimal::ZERO));
        report
            .lines
            .entry(key)
            .or_insert_with(|| UstvaLineItem::new(rate))
            .add(receipt.receipt_type, net, cents(vat));
    }

    for line in report.lines.values_mut() {
        line.round();
    }

    debug!(
        "UStVA {}..{}: {} receipts in {} rate line(s), {} skipped",
        start,
        end,
        report.total_receipts(),
        report.lines.len(),
        report.skipped_count
    );

    report
}
