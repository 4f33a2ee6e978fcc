//! VAT rate and amount extraction for German receipts.

use regex::Regex;
use rust_decimal::Decimal;

use super::amounts::parse_german_amount;
use super::patterns::{VAT_ENGLISH, VAT_MWST, VAT_PERCENT_EUR};
use super::{ExtractionMatch, FieldExtractor};

/// A VAT rate together with the VAT amount printed next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VatInfo {
    /// Rate in percent (19 for 19%).
    pub percentage: Decimal,
    pub amount: Decimal,
}

/// VAT rate + amount extractor.
pub struct VatExtractor;

impl VatExtractor {
    pub fn new() -> Self {
        Self
    }

    fn patterns() -> [&'static Regex; 3] {
        [&*VAT_PERCENT_EUR, &*VAT_MWST, &*VAT_ENGLISH]
    }
}

impl Default for VatExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for VatExtractor {
    type Output = ExtractionMatch<VatInfo>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        for pattern in Self::patterns() {
            for caps in pattern.captures_iter(text) {
                let (Some(rate), Some(amount)) = (
                    parse_german_amount(&caps[1]),
                    parse_german_amount(&caps[2]),
                ) else {
                    continue;
                };
                // Zero rate or zero amount carries no VAT to report
                if rate.is_zero() || amount.is_zero() {
                    continue;
                }

                let info = VatInfo { percentage: rate.normalize(), amount };
                if results.iter().any(|r| r.value == info) {
                    continue;
                }
                if let Some(m) = caps.get(0) {
                    results.push(
                        ExtractionMatch::new(info, 0.85, m.as_str()).with_position(m.start(), m.end()),
                    );
                }
            }
        }

        results
    }
}

/// First VAT rate + amount pair in the text.
pub fn extract_vat(text: &str) -> Option<VatInfo> {
    VatExtractor::new().extract(text).map(|m| m.value)
}
