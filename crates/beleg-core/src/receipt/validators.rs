//! Sanity checks and type coercion for what the passes return.
//!
//! Models answer with loosely typed JSON. Each validator keeps the values
//! that are plausible for its pass and writes them into a
//! [`PartialReceipt`]; everything else is dropped without error.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::receipt::{ReceiptCategory, ReceiptItem};

use super::partial::PartialReceipt;
use super::passes::PassKind;
use super::rules::{categorize_item, parse_date, parse_german_amount};

/// Route a parsed pass answer to its validator.
pub fn apply(pass: PassKind, map: &Map<String, Value>, out: &mut PartialReceipt) {
    match pass {
        PassKind::Metadata => validate_metadata(map, out),
        PassKind::Counterparty => validate_counterparty(map, out),
        PassKind::Amounts => validate_amounts(map, out),
        PassKind::LineItems => validate_items(map, out),
    }
}

/// `receipt_number`, `receipt_date`, `category`.
pub fn validate_metadata(map: &Map<String, Value>, out: &mut PartialReceipt) {
    if let Some(number) = text_field(map.get("receipt_number")) {
        out.receipt_number = Some(number);
    }

    if let Some(date) = map.get("receipt_date").and_then(Value::as_str).and_then(parse_date) {
        out.receipt_date = Some(date);
    }

    if let Some(category) = map.get("category").and_then(Value::as_str) {
        out.category = Some(ReceiptCategory::parse_lossy(category));
    }
}

/// Name, tax identifiers and address parts.
pub fn validate_counterparty(map: &Map<String, Value>, out: &mut PartialReceipt) {
    let cp = &mut out.counterparty;
    let fields: [(&str, &mut Option<String>); 8] = [
        ("name", &mut cp.name),
        ("vat_id", &mut cp.vat_id),
        ("tax_number", &mut cp.tax_number),
        ("street", &mut cp.address.street),
        ("street_number", &mut cp.address.street_number),
        ("postcode", &mut cp.address.postcode),
        ("city", &mut cp.address.city),
        ("country", &mut cp.address.country),
    ];

    for (key, slot) in fields {
        if let Some(value) = text_field(map.get(key)) {
            *slot = Some(value);
        }
    }
}

/// Total, VAT rate and VAT amount.
///
/// The total must be positive and the rate within 0-100. The VAT amount
/// must not be negative and, when the total is known, below it.
pub fn validate_amounts(map: &Map<String, Value>, out: &mut PartialReceipt) {
    let total = decimal_field(map.get("total_amount"));
    let pct = decimal_field(map.get("vat_percentage"));
    let vat = decimal_field(map.get("vat_amount"));

    match total {
        Some(t) if t > Decimal::ZERO => out.total_amount = Some(t),
        Some(t) => debug!("Dropping non-positive total {}", t),
        None => {}
    }

    match pct {
        Some(p) if is_percentage(p) => out.vat_percentage = Some(p),
        Some(p) => debug!("Dropping VAT rate {} outside 0-100", p),
        None => {}
    }

    match (vat, total) {
        (Some(v), Some(t)) if v >= Decimal::ZERO && v < t => out.vat_amount = Some(v),
        (Some(v), None) if v >= Decimal::ZERO => out.vat_amount = Some(v),
        (Some(v), _) => debug!("Dropping implausible VAT amount {}", v),
        (None, _) => {}
    }
}

/// The `items` list. Rows with neither description nor total are noise.
pub fn validate_items(map: &Map<String, Value>, out: &mut PartialReceipt) {
    let Some(rows) = map.get("items").and_then(Value::as_array) else {
        return;
    };

    let mut items = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        let description = text_field(row.get("description"));
        let total_price = decimal_field(row.get("total_price"));
        if description.is_none() && total_price.is_none() {
            continue;
        }

        let description = description.unwrap_or_default();
        let category = match row.get("category").and_then(Value::as_str) {
            Some(category) => ReceiptCategory::parse_lossy(category),
            None => categorize_item(&description),
        };

        items.push(ReceiptItem {
            position: Some(items.len() as u32 + 1),
            quantity: decimal_field(row.get("quantity")),
            unit_price: decimal_field(row.get("unit_price")),
            total_price,
            vat_rate: decimal_field(row.get("vat_rate")).filter(|r| is_percentage(*r)),
            vat_amount: decimal_field(row.get("vat_amount")),
            category,
            description,
        });
    }

    if !items.is_empty() {
        out.items = items;
    }
}

fn is_percentage(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

/// A string value that is a real value rather than a form label.
///
/// Labels end with `:`; anything shorter than two characters is noise.
pub fn text_field(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if s.ends_with(':') || s.chars().count() < 2 {
        return None;
    }
    Some(s)
}

/// A decimal given either as a JSON number or as a (possibly German) string.
pub fn decimal_field(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        Value::String(s) => parse_decimal_text(s),
        _ => None,
    }
}

fn parse_decimal_text(s: &str) -> Option<Decimal> {
    let cleaned = s
        .trim()
        .trim_end_matches('%')
        .trim_end_matches('€')
        .trim_end_matches("EUR")
        .trim();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned.contains(',') {
        return parse_german_amount(cleaned);
    }
    Decimal::from_str(cleaned).ok()
}
