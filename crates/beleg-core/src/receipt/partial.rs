//! The partial receipt every extraction stage reads from and writes into.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::models::receipt::{
    Address, Counterparty, ReceiptCategory, ReceiptData, ReceiptItem, ReceiptType, VatSplit,
};

/// Counterparty fields as found so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialCounterparty {
    pub name: Option<String>,
    pub vat_id: Option<String>,
    pub tax_number: Option<String>,
    pub address: Address,
}

impl PartialCounterparty {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.vat_id.is_none()
            && self.tax_number.is_none()
            && self.address.is_empty()
    }

    /// Materialize as a counterparty with a fresh identifier.
    pub fn into_counterparty(self) -> Counterparty {
        Counterparty {
            tax_number: self.tax_number,
            vat_id: self.vat_id,
            address: self.address,
            ..Counterparty::new(self.name)
        }
    }
}

/// Receipt with every field optional.
///
/// Rule extraction fills one, each inference pass fills its own slice of
/// fields in another, and the final one is turned into a [`ReceiptData`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialReceipt {
    pub receipt_number: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub category: Option<ReceiptCategory>,
    pub counterparty: PartialCounterparty,
    pub total_amount: Option<Decimal>,
    pub vat_percentage: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub items: Vec<ReceiptItem>,
}

impl PartialReceipt {
    /// True when no stage contributed anything.
    pub fn is_empty(&self) -> bool {
        self.receipt_number.is_none()
            && self.receipt_date.is_none()
            && self.category.is_none()
            && self.counterparty.is_empty()
            && self.total_amount.is_none()
            && self.vat_percentage.is_none()
            && self.vat_amount.is_none()
            && self.items.is_empty()
    }

    /// Assemble the final record. The identifier is derived from `raw_text`.
    pub fn into_receipt(self, raw_text: &str, receipt_type: ReceiptType) -> ReceiptData {
        let mut receipt = ReceiptData::new(raw_text, receipt_type);

        receipt.counterparty = if self.counterparty.is_empty() {
            None
        } else {
            Some(self.counterparty.into_counterparty())
        };
        receipt.receipt_number = self.receipt_number;
        receipt.receipt_date = self.receipt_date;
        receipt.total_amount = self.total_amount;
        receipt.vat_percentage = self.vat_percentage;
        receipt.vat_amount = self.vat_amount;
        receipt.category = self.category.unwrap_or_default();
        receipt.vat_splits = vat_splits_from_items(&self.items);
        receipt.items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(i, item)| ReceiptItem {
                position: Some(i as u32 + 1),
                ..item
            })
            .collect();

        receipt
    }
}

/// Per-rate VAT totals, only for receipts whose items carry more than one rate.
fn vat_splits_from_items(items: &[ReceiptItem]) -> Vec<VatSplit> {
    let mut by_rate: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for item in items {
        if let (Some(rate), Some(amount)) = (item.vat_rate, item.vat_amount) {
            let sum = by_rate.entry(rate.normalize()).or_default();
            match sum.checked_add(amount) {
                Some(total) => *sum = total,
                None => warn!("Dropping VAT amount {} at {} %: sum overflows", amount, rate),
            }
        }
    }

    if by_rate.len() < 2 {
        return Vec::new();
    }

    by_rate
        .into_iter()
        .enumerate()
        .map(|(i, (rate, amount))| VatSplit {
            position: Some(i as u32 + 1),
            vat_rate: Some(rate),
            vat_amount: Some(amount),
        })
        .collect()
}
