//! Rule-based field extractors for German receipts.

pub mod amounts;
pub mod dates;
pub mod items;
pub mod names;
pub mod patterns;
pub mod vat;

pub use amounts::{extract_amounts, format_german_amount, parse_german_amount, AmountExtractor};
pub use dates::{extract_date, parse_date, DateExtractor};
pub use items::{categorize_item, extract_items, ItemExtractor};
pub use names::extract_counterparty_name;
pub use vat::{extract_vat, VatExtractor, VatInfo};

use tracing::debug;

use super::partial::PartialReceipt;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Extraction context with confidence scores.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Position in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}

/// Runs every rule extractor over OCR text and collects the results.
///
/// Never fails: fields that cannot be found stay `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleExtractor;

impl RuleExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> PartialReceipt {
        let mut partial = PartialReceipt::default();

        partial.counterparty.name = extract_counterparty_name(text);
        partial.receipt_date = extract_date(text);
        partial.total_amount = extract_amounts(text).total.map(|m| m.value);

        if let Some(vat) = extract_vat(text) {
            partial.vat_percentage = Some(vat.percentage);
            partial.vat_amount = Some(vat.amount);
        }

        partial.items = extract_items(text);

        debug!(
            name = ?partial.counterparty.name,
            date = ?partial.receipt_date,
            total = ?partial.total_amount,
            items = partial.items.len(),
            "Rule extraction finished"
        );

        partial
    }
}
