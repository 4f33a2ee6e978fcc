//! User corrections to a stored receipt.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::receipt::{ReceiptCategory, ReceiptItem, ReceiptType, VatSplit};

/// Address parts to overwrite. `None` leaves a part unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddressUpdate {
    pub street: Option<String>,
    pub street_number: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl AddressUpdate {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.street_number.is_none()
            && self.postcode.is_none()
            && self.city.is_none()
            && self.country.is_none()
    }
}

/// Fields a user may correct after extraction.
///
/// Every field is optional and `None` means "keep". `items` and
/// `vat_splits` replace the stored lists as a whole. The receipt
/// identifier is never part of an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiptUpdate {
    pub receipt_type: Option<ReceiptType>,
    pub receipt_number: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
    pub vat_percentage: Option<Decimal>,
    pub vat_amount: Option<Decimal>,
    pub category: Option<ReceiptCategory>,

    pub counterparty_name: Option<String>,
    pub vat_id: Option<String>,
    pub tax_number: Option<String>,
    pub address: Option<AddressUpdate>,
    pub counterparty_verified: Option<bool>,

    pub items: Option<Vec<ReceiptItem>>,
    pub vat_splits: Option<Vec<VatSplit>>,
}

impl ReceiptUpdate {
    /// Changes to the counterparty's name, tax ids or address.
    pub fn touches_counterparty(&self) -> bool {
        self.counterparty_name.is_some()
            || self.vat_id.is_some()
            || self.tax_number.is_some()
            || self.address.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.receipt_type.is_none()
            && self.receipt_number.is_none()
            && self.receipt_date.is_none()
            && self.total_amount.is_none()
            && self.vat_percentage.is_none()
            && self.vat_amount.is_none()
            && self.category.is_none()
            && !self.touches_counterparty()
            && self.counterparty_verified.is_none()
            && self.items.is_none()
            && self.vat_splits.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_json() {
        let update: ReceiptUpdate = serde_json::from_str(
            r#"{
                "total_amount": 119.0,
                "vat_amount": "19.00",
                "receipt_date": "2024-02-29",
                "category": "Travel",
                "address": {"city": "Hamburg"}
            }"#,
        )
        .unwrap();

        assert_eq!(update.total_amount, Some(Decimal::from_str("119").unwrap()));
        assert_eq!(update.vat_amount, Some(Decimal::from_str("19.00").unwrap()));
        assert_eq!(update.receipt_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(update.category, Some(ReceiptCategory::Travel));
        assert!(update.touches_counterparty());
        assert!(update.items.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<ReceiptUpdate>(r#"{"id": "abc"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty() {
        assert!(ReceiptUpdate::default().is_empty());

        let update = ReceiptUpdate {
            address: Some(AddressUpdate::default()),
            ..Default::default()
        };
        assert!(!update.touches_counterparty());
        assert!(update.is_empty());
    }
}
