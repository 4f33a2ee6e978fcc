//! Receipt data models for German purchase and sales documents.

use std::fmt;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::content_hash;

/// Closed category vocabulary shared by prompts, rules and storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ReceiptCategory {
    // Revenue side (sales)
    Services,
    Consulting,
    Products,
    Licensing,
    // Expense side (purchases)
    Material,
    Equipment,
    Internet,
    Telecommunication,
    Software,
    Education,
    Travel,
    Utilities,
    Insurance,
    Taxes,
    #[default]
    Other,
}

impl ReceiptCategory {
    /// Every category, in prompt order.
    pub const ALL: [ReceiptCategory; 15] = [
        ReceiptCategory::Services,
        ReceiptCategory::Consulting,
        ReceiptCategory::Products,
        ReceiptCategory::Licensing,
        ReceiptCategory::Material,
        ReceiptCategory::Equipment,
        ReceiptCategory::Internet,
        ReceiptCategory::Telecommunication,
        ReceiptCategory::Software,
        ReceiptCategory::Education,
        ReceiptCategory::Travel,
        ReceiptCategory::Utilities,
        ReceiptCategory::Insurance,
        ReceiptCategory::Taxes,
        ReceiptCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptCategory::Services => "services",
            ReceiptCategory::Consulting => "consulting",
            ReceiptCategory::Products => "products",
            ReceiptCategory::Licensing => "licensing",
            ReceiptCategory::Material => "material",
            ReceiptCategory::Equipment => "equipment",
            ReceiptCategory::Internet => "internet",
            ReceiptCategory::Telecommunication => "telecommunication",
            ReceiptCategory::Software => "software",
            ReceiptCategory::Education => "education",
            ReceiptCategory::Travel => "travel",
            ReceiptCategory::Utilities => "utilities",
            ReceiptCategory::Insurance => "insurance",
            ReceiptCategory::Taxes => "taxes",
            ReceiptCategory::Other => "other",
        }
    }

    /// Parse a category, falling back to `Other` for anything unrecognized.
    pub fn parse_lossy(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .unwrap_or(ReceiptCategory::Other)
    }
}

impl From<String> for ReceiptCategory {
    fn from(s: String) -> Self {
        Self::parse_lossy(&s)
    }
}

impl From<&str> for ReceiptCategory {
    fn from(s: &str) -> Self {
        Self::parse_lossy(s)
    }
}

impl fmt::Display for ReceiptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a document from the bookkeeper's point of view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum ReceiptType {
    /// Eingangsrechnung: VAT paid is reclaimed as input tax.
    #[default]
    Purchase,
    /// Ausgangsrechnung: VAT charged is remitted as output tax.
    Sale,
}

impl ReceiptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptType::Purchase => "purchase",
            ReceiptType::Sale => "sale",
        }
    }

    /// Parse a receipt type; anything other than "sale" is a purchase.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "sale" | "sales" | "verkauf" | "ausgang" => ReceiptType::Sale,
            _ => ReceiptType::Purchase,
        }
    }
}

impl From<String> for ReceiptType {
    fn from(s: String) -> Self {
        Self::parse_lossy(&s)
    }
}

impl From<&str> for ReceiptType {
    fn from(s: &str) -> Self {
        Self::parse_lossy(s)
    }
}

impl fmt::Display for ReceiptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Postal address of a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street name without the building number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,

    /// Building number (Hausnummer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_number: Option<String>,

    /// Postal code (PLZ).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    /// Check if the address has any data.
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.street_number.is_none()
            && self.postcode.is_none()
            && self.city.is_none()
            && self.country.is_none()
    }

    /// Format address as a single line, e.g. "Hauptstr. 5, 10115 Berlin".
    pub fn format(&self) -> String {
        let mut parts = Vec::new();

        match (&self.street, &self.street_number) {
            (Some(street), Some(number)) => parts.push(format!("{} {}", street, number)),
            (Some(street), None) => parts.push(street.clone()),
            _ => {}
        }
        match (&self.postcode, &self.city) {
            (Some(postcode), Some(city)) => parts.push(format!("{} {}", postcode, city)),
            (None, Some(city)) => parts.push(city.clone()),
            (Some(postcode), None) => parts.push(postcode.clone()),
            _ => {}
        }
        if let Some(country) = &self.country {
            if !matches!(country.as_str(), "Deutschland" | "Germany" | "DE") {
                parts.push(country.clone());
            }
        }

        parts.join(", ")
    }
}

/// Vendor (on a purchase) or client (on a sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparty {
    /// Generated row identifier.
    pub id: String,

    /// Business or person name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// German Steuernummer (e.g. 123/456/78901).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_number: Option<String>,

    /// EU VAT identification number (e.g. DE123456789).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,

    #[serde(default)]
    pub address: Address,

    /// Identity confirmed by the user.
    #[serde(default)]
    pub verified: bool,
}

impl Counterparty {
    /// Create an unverified counterparty with a fresh identifier.
    pub fn new(name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            tax_number: None,
            vat_id: None,
            address: Address::default(),
            verified: false,
        }
    }

    pub fn with_vat_id(mut self, vat_id: impl Into<String>) -> Self {
        self.vat_id = Some(vat_id.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }
}

/// A single line item on a receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// 1-based position on the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,

    /// Line total as printed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<Decimal>,

    /// VAT rate in percent (19 for 19%).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Decimal>,

    #[serde(default)]
    pub category: ReceiptCategory,
}

/// VAT amount for one rate on a receipt with mixed rates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatSplit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_rate: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Decimal>,
}

/// Structured data extracted from a single receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    /// SHA-256 content hash of the normalized OCR text.
    pub id: String,

    #[serde(default)]
    pub receipt_type: ReceiptType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_date: Option<NaiveDate>,

    /// Gross total (brutto).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,

    /// VAT rate in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_percentage: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Decimal>,

    #[serde(default)]
    pub category: ReceiptCategory,

    #[serde(default)]
    pub items: Vec<ReceiptItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vat_splits: Vec<VatSplit>,

    /// OCR text the record was extracted from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_text: String,
}

impl ReceiptData {
    /// Create an empty receipt whose identifier is derived from `raw_text`.
    pub fn new(raw_text: impl Into<String>, receipt_type: ReceiptType) -> Self {
        let raw_text = raw_text.into();
        Self {
            id: content_hash(&raw_text),
            receipt_type,
            counterparty: None,
            receipt_number: None,
            receipt_date: None,
            total_amount: None,
            vat_percentage: None,
            vat_amount: None,
            category: ReceiptCategory::Other,
            items: Vec::new(),
            vat_splits: Vec::new(),
            raw_text,
        }
    }

    /// Total minus VAT, when both are known.
    pub fn net_amount(&self) -> Option<Decimal> {
        match (self.total_amount, self.vat_amount) {
            (Some(total), Some(vat)) => total.checked_sub(vat),
            _ => None,
        }
    }

    pub fn is_purchase(&self) -> bool {
        self.receipt_type == ReceiptType::Purchase
    }

    /// Validate the receipt against today's date and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        self.validate_as_of(Local::now().date_naive())
    }

    /// Validate the receipt and return any issues found.
    ///
    /// An empty list means the record is plausible. Nothing is corrected.
    pub fn validate_as_of(&self, today: NaiveDate) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(date) = self.receipt_date {
            if date > today {
                issues.push(format!("Receipt date {} is in the future", date));
            }
        }

        if let Some(total) = self.total_amount {
            if total <= Decimal::ZERO {
                issues.push(format!("Total amount {} is not positive", total));
            }
        }

        if let Some(pct) = self.vat_percentage {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                issues.push(format!("VAT percentage {} is outside 0-100", pct));
            }
        }

        if let (Some(total), Some(vat)) = (self.total_amount, self.vat_amount) {
            if vat > total {
                issues.push(format!("VAT amount {} exceeds total {}", vat, total));
            }
        }

        issues
    }
}

/// Outcome of one pipeline run. Always check `success` before `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,

    #[serde(default)]
    pub data: Option<ReceiptData>,

    #[serde(default)]
    pub error_message: Option<String>,

    /// Wall-clock processing time in milliseconds.
    #[serde(default)]
    pub processing_time_ms: u64,

    /// The text was already stored; `data` is the stored record.
    #[serde(default)]
    pub duplicate: bool,

    #[serde(default)]
    pub existing_id: Option<String>,
}

impl ExtractionResult {
    pub fn ok(data: ReceiptData, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
            processing_time_ms,
            duplicate: false,
            existing_id: None,
        }
    }

    pub fn duplicate(existing: Option<ReceiptData>, id: String, processing_time_ms: u64) -> Self {
        Self {
            success: true,
            data: existing,
            error_message: None,
            processing_time_ms,
            duplicate: true,
            existing_id: Some(id),
        }
    }

    pub fn failed(message: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(message.into()),
            processing_time_ms,
            duplicate: false,
            existing_id: None,
        }
    }
}
