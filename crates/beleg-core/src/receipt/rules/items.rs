//! Line item extraction and keyword categorisation.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::receipt::{ReceiptCategory, ReceiptItem};

use super::amounts::parse_german_amount;
use super::patterns::{ITEM_QTY, ITEM_SIMPLE, ITEM_UNIT_PRICE, NON_ITEM_MARKERS, TOTAL_KEYWORDS};
use super::{ExtractionMatch, FieldExtractor};

/// German description keywords per expense category, checked in order.
const CATEGORY_KEYWORDS: &[(ReceiptCategory, &[&str])] = &[
    (ReceiptCategory::Material, &["papier", "rohstoff", "verbrauch", "büromaterial", "druckerpapier"]),
    (
        ReceiptCategory::Equipment,
        &["gerät", "drucker", "monitor", "tastatur", "maus", "server", "hardware", "maschine"],
    ),
    (ReceiptCategory::Software, &["software", "lizenz", "abo", "subscription", "cloud", "saas"]),
    (ReceiptCategory::Internet, &["internet", "dsl", "glasfaser", "breitband", "hosting", "domain"]),
    (
        ReceiptCategory::Telecommunication,
        &["telefon", "handy", "mobilfunk", "sim-karte", "telekom", "vodafone"],
    ),
    (ReceiptCategory::Travel, &["hotel", "flug", "bahn", "taxi", "mietwagen", "reise", "übernachtung"]),
    (
        ReceiptCategory::Education,
        &["kurs", "seminar", "buch", "schulung", "weiterbildung", "zertifikat"],
    ),
    (ReceiptCategory::Utilities, &["strom", "wasser", "heizung", "nebenkosten", "entsorgung"]),
    (ReceiptCategory::Insurance, &["versicherung", "haftpflicht", "police", "prämie"]),
    (ReceiptCategory::Taxes, &["steuer", "finanzamt", "steuerberater", "gebühr", "abgabe"]),
];

/// Line item extractor. Works line by line; the first pattern that
/// matches a line decides how it is read.
pub struct ItemExtractor;

impl ItemExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(&self, line: &str) -> Option<ReceiptItem> {
        let lower = line.to_lowercase();
        if TOTAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
            || NON_ITEM_MARKERS.iter().any(|kw| lower.contains(kw))
        {
            return None;
        }

        // "2 x Kaffee 6,40 €"
        if let Some(caps) = ITEM_QTY.captures(line) {
            let quantity = Decimal::from_str(&caps[1].replace(',', ".")).ok()?;
            let description = caps[2].trim().to_string();
            let total = parse_german_amount(&caps[3])?;
            let unit_price = Some(quantity)
                .filter(|q| *q > Decimal::ZERO)
                .and_then(|q| total.checked_div(q))
                .map(|p| p.round_dp(2));
            return Some(item(description, Some(quantity), unit_price, total));
        }

        // "Kaffee @ 3,20 = 6,40 €"
        if let Some(caps) = ITEM_UNIT_PRICE.captures(line) {
            let description = caps[1].trim().to_string();
            let unit_price = parse_german_amount(&caps[2])?;
            let total = parse_german_amount(&caps[3])?;
            let quantity = Some(unit_price)
                .filter(|p| *p > Decimal::ZERO)
                .and_then(|p| total.checked_div(p))
                .map(|q| q.round_dp(3).normalize());
            return Some(item(description, quantity, Some(unit_price), total));
        }

        // "Kaffee 3,20 €"
        if let Some(caps) = ITEM_SIMPLE.captures(line) {
            let description = caps[1].trim().to_string();
            let total = parse_german_amount(&caps[2])?;
            return Some(item(description, None, None, total));
        }

        None
    }
}

impl Default for ItemExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for ItemExtractor {
    type Output = ExtractionMatch<ReceiptItem>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                self.parse_line(line)
                    .map(|parsed| ExtractionMatch::new(parsed, 0.6, line))
            })
            .collect()
    }
}

fn item(
    description: String,
    quantity: Option<Decimal>,
    unit_price: Option<Decimal>,
    total: Decimal,
) -> ReceiptItem {
    ReceiptItem {
        category: categorize_item(&description),
        description,
        quantity,
        unit_price,
        total_price: Some(total),
        ..Default::default()
    }
}

/// Extract line items, numbered from 1 in document order.
pub fn extract_items(text: &str) -> Vec<ReceiptItem> {
    ItemExtractor::new()
        .extract_all(text)
        .into_iter()
        .enumerate()
        .map(|(i, m)| ReceiptItem {
            position: Some(i as u32 + 1),
            ..m.value
        })
        .collect()
}

/// Map an item description to a category via German keywords.
pub fn categorize_item(description: &str) -> ReceiptCategory {
    let lower = description.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(ReceiptCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_unit_price_dropped_when_division_overflows() {
        let text = "Shop GmbH\n0,0000001 x Kabel 79.228.162.514.264.337.593.543.950,33 €";

        let items = extract_items(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, Some(dec("0.0000001")));
        assert_eq!(items[0].unit_price, None);
        assert_eq!(items[0].total_price, Some(dec("79228162514264337593543950.33")));

        let partial = super::super::RuleExtractor::new().extract(text);
        assert_eq!(partial.items.len(), 1);
    }

    #[test]
    fn test_quantity_pattern_before_simple() {
        let items = extract_items("2 x Druckerpapier A4 9,98 €");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Druckerpapier A4");
        assert_eq!(items[0].quantity, Some(dec("2")));
        assert_eq!(items[0].unit_price, Some(dec("4.99")));
        assert_eq!(items[0].total_price, Some(dec("9.98")));
        assert_eq!(items[0].category, ReceiptCategory::Material);
    }

    #[test]
    fn test_unit_price_pattern() {
        let items = extract_items("USB Maus @ 12,50 = 25,00 €");

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "USB Maus");
        assert_eq!(items[0].quantity, Some(dec("2")));
        assert_eq!(items[0].unit_price, Some(dec("12.50")));
        assert_eq!(items[0].total_price, Some(dec("25.00")));
        assert_eq!(items[0].category, ReceiptCategory::Equipment);
    }

    #[test]
    fn test_totals_and_tax_lines_are_not_items() {
        let text = "\
Hotel Adler
Übernachtung 1.099,00 €
Frühstück 18,50 €
Netto 939,08 €
MwSt 7% 65,74 €
Gesamtbetrag 1.117,50 €";

        let items = extract_items(text);
        let descriptions: Vec<&str> = items.iter().map(|i| i.description.as_str()).collect();

        assert_eq!(descriptions, vec!["Übernachtung", "Frühstück"]);
        assert_eq!(items[0].position, Some(1));
        assert_eq!(items[1].position, Some(2));
        assert_eq!(items[0].total_price, Some(dec("1099.00")));
        assert_eq!(items[0].category, ReceiptCategory::Travel);
        assert_eq!(items[1].category, ReceiptCategory::Other);
    }

    #[test]
    fn test_categorize_item() {
        assert_eq!(categorize_item("Haftpflichtversicherung 2024"), ReceiptCategory::Insurance);
        assert_eq!(categorize_item("DSL 100 Tarif"), ReceiptCategory::Internet);
        assert_eq!(categorize_item("Brötchen"), ReceiptCategory::Other);
    }
}
