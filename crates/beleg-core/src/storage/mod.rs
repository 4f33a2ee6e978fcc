//! Receipt persistence.

mod schema;
mod sqlite;
mod update;

pub use schema::SCHEMA_VERSION;
pub use sqlite::Repository;
pub use update::{AddressUpdate, ReceiptUpdate};

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::receipt::{ReceiptCategory, ReceiptData, ReceiptType};

/// Content-addressed receipt storage.
///
/// Receipts are keyed by their content hash. Saving a receipt whose
/// identifier is already stored is a no-op reported as `Ok(false)`.
pub trait ReceiptStore {
    /// Store a new receipt with its counterparty, items and VAT splits.
    fn save(&self, receipt: &ReceiptData) -> Result<bool>;

    fn exists(&self, id: &str) -> Result<bool>;

    fn get(&self, id: &str) -> Result<Option<ReceiptData>>;

    /// Remove a receipt and everything it owns.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Apply user corrections. `Ok(false)` if the receipt does not exist.
    fn update(&self, id: &str, changes: &ReceiptUpdate) -> Result<bool>;

    /// Receipts dated within `[start, end]`, newest first.
    fn find_by_period(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ReceiptData>>;

    /// Newest first, undated receipts last.
    fn find_by_category(&self, category: ReceiptCategory) -> Result<Vec<ReceiptData>>;

    /// Newest first, undated receipts last.
    fn find_by_type(&self, receipt_type: ReceiptType) -> Result<Vec<ReceiptData>>;

    fn list_all(&self) -> Result<Vec<ReceiptData>>;
}
