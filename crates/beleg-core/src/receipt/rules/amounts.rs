//! Amount extraction for German receipts.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_EUR, SUBTOTAL_MARKERS, TOTAL_KEYWORDS};
use super::{ExtractionMatch, FieldExtractor};

/// Amount field extractor. Only amounts next to `€` or `EUR` count.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in AMOUNT_EUR.captures_iter(text) {
            let Some(m) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            if let Some(amount) = parse_german_amount(m.as_str()) {
                results.push(
                    ExtractionMatch::new(amount, 0.8, m.as_str()).with_position(m.start(), m.end()),
                );
            }
        }

        results
    }
}

/// Amounts found on a receipt.
#[derive(Debug, Clone, Default)]
pub struct ReceiptAmounts {
    /// Grand total: keyword-anchored if possible, else the largest amount.
    pub total: Option<ExtractionMatch<Decimal>>,
    /// Every amount, in document order.
    pub all: Vec<ExtractionMatch<Decimal>>,
}

/// Extract amounts and pick the grand total.
///
/// The first amount on a line containing a total keyword wins. The
/// maximum is only used when no such line exists, because item lines
/// can exceed a discounted total or a partial sum.
pub fn extract_amounts(text: &str) -> ReceiptAmounts {
    let extractor = AmountExtractor::new();
    let mut result = ReceiptAmounts::default();

    for line in text.lines() {
        let lower = line.to_lowercase();
        let is_total_line = TOTAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
            && !SUBTOTAL_MARKERS.iter().any(|m| lower.contains(m));

        for found in extractor.extract_all(line) {
            if is_total_line && result.total.is_none() {
                result.total = Some(ExtractionMatch::new(found.value, 0.95, line.trim()));
            }
            result.all.push(found);
        }
    }

    if result.total.is_none() {
        result.total = result.all.iter().max_by(|a, b| a.value.cmp(&b.value)).cloned();
    }

    result
}

/// Parse a German-formatted amount ("1.234,56" or "1.234,56 €").
///
/// A string without a comma is read as a plain decimal ("1234.56"), so
/// values already normalized by a model survive a second pass.
pub fn parse_german_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    Decimal::from_str(&normalized).ok()
}

/// Format an amount German style ("1.234,56").
pub fn format_german_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let s = format!("{:.2}", rounded.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{},{}", sign, formatted, decimal_part)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_german_amount() {
        assert_eq!(parse_german_amount("1.234,56 €"), Some(dec("1234.56")));
        assert_eq!(parse_german_amount("1234,56"), Some(dec("1234.56")));
        assert_eq!(parse_german_amount("12.345.678,90"), Some(dec("12345678.90")));
        assert_eq!(parse_german_amount("0,99"), Some(dec("0.99")));
        assert_eq!(parse_german_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_german_amount("€"), None);
    }

    #[test]
    fn test_subtotal_is_not_the_total() {
        let text = "Zwischensumme 949,00 €\nRabatt 49,00 €\nSumme 900,00 €";
        assert_eq!(extract_amounts(text).total.unwrap().value, dec("900.00"));

        let text = "Subtotal 120,00 €\nTotal 100,00 €";
        assert_eq!(extract_amounts(text).total.unwrap().value, dec("100.00"));
    }

    #[test]
    fn test_format_german_amount() {
        assert_eq!(format_german_amount(dec("1234.56")), "1.234,56");
        assert_eq!(format_german_amount(dec("12345678.9")), "12.345.678,90");
        assert_eq!(format_german_amount(dec("5")), "5,00");
        assert_eq!(format_german_amount(dec("-20")), "-20,00");
    }

    #[test]
    fn test_keyword_total_beats_maximum() {
        let text = "Artikel A 50,00 €\nArtikel B 899,00 €\nGesamtbetrag 949,00 €\n";
        let amounts = extract_amounts(text);

        assert_eq!(amounts.total.unwrap().value, dec("949.00"));
        assert_eq!(amounts.all.len(), 3);
    }

    #[test]
    fn test_keyword_total_smaller_than_item() {
        let text = "Monitor 899,00 €\nRabatt 100,00 €\nSumme 799,00 €";
        assert_eq!(extract_amounts(text).total.unwrap().value, dec("799.00"));
    }

    #[test]
    fn test_maximum_fallback_without_keyword() {
        let text = "Kaffee 3,20 €\nKuchen 4,50 €";
        assert_eq!(extract_amounts(text).total.unwrap().value, dec("4.50"));
    }

    #[test]
    fn test_no_amounts() {
        let amounts = extract_amounts("Vielen Dank für Ihren Einkauf");
        assert!(amounts.total.is_none());
        assert!(amounts.all.is_empty());
    }

    #[test]
    fn test_extract_all_amounts() {
        let extractor = AmountExtractor::new();
        let results = extractor.extract_all("Preis: EUR 100,00, Gesamt: 1.234,56 €");
        let values: Vec<Decimal> = results.into_iter().map(|m| m.value).collect();
        assert_eq!(values, vec![dec("100.00"), dec("1234.56")]);
    }
}
