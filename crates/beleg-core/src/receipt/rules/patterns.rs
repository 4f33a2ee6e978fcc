//! Common regex patterns for German receipt extraction.
//!
//! Amounts use the German locale: `.` groups thousands, `,` separates
//! cents ("1.234,56").

use lazy_static::lazy_static;
use regex::Regex;

/// German-locale amount: "1.234,56", "949,00", "12345,00".
pub const AMOUNT: &str = r"(?:\d{1,3}(?:\.\d{3})+|\d+),\d{2}";

/// VAT rate: "19", "7", "7,5".
pub const RATE: &str = r"\d{1,2}(?:,\d{1,2})?";

/// Keywords that anchor a line as the grand total.
pub const TOTAL_KEYWORDS: &[&str] = &[
    "gesamt",
    "gesamtbetrag",
    "total",
    "summe",
    "endbetrag",
    "brutto",
    "rechnungsbetrag",
    "sum",
    "grand total",
];

/// Partial sums that contain a total keyword but are not the total.
pub const SUBTOTAL_MARKERS: &[&str] = &["zwischen", "subtotal", "sub-total", "sub total"];

/// Tax and payment lines that look like "text amount" but are no items.
pub const NON_ITEM_MARKERS: &[&str] = &[
    "mwst",
    "umsatzsteuer",
    "ust.",
    "vat",
    "netto",
    "%",
    "rückgeld",
    "gegeben",
    "kartenzahlung",
];

/// Header lines containing these are receipt boilerplate, not names.
pub const SKIP_HEADER_WORDS: &[&str] = &[
    "receipt", "rechnung", "kassenbon", "beleg", "quittung", "datum", "uhrzeit", "kasse", "bon",
];

lazy_static! {
    // Amounts adjacent to a currency marker, either side.
    pub static ref AMOUNT_EUR: Regex = Regex::new(&format!(
        r"(?:€|EUR)\s*({a})\b|\b({a})\s*(?:€|EUR)",
        a = AMOUNT
    )).unwrap();

    // Dates, in the order they are tried
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b"
    ).unwrap();

    pub static ref DATE_DMY_SHORT: Regex = Regex::new(
        r"\b(\d{1,2})\.(\d{1,2})\.(\d{2})\b"
    ).unwrap();

    pub static ref DATE_ISO: Regex = Regex::new(
        r"\b(\d{4})-(\d{2})-(\d{2})\b"
    ).unwrap();

    pub static ref DATE_SLASH: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"
    ).unwrap();

    pub static ref DATE_NAMED: Regex = Regex::new(
        r"\b(\d{1,2})\.?\s+([A-Za-zÄÖÜäöü]+)\.?\s+(\d{4})\b"
    ).unwrap();

    // VAT rate + amount on one line
    pub static ref VAT_PERCENT_EUR: Regex = Regex::new(&format!(
        r"(?i)\b({r})\s*%.*?({a})\s*(?:€|EUR)",
        r = RATE, a = AMOUNT
    )).unwrap();

    pub static ref VAT_MWST: Regex = Regex::new(&format!(
        r"(?i)MwSt\.?\s*({r})\s*%.*?({a})",
        r = RATE, a = AMOUNT
    )).unwrap();

    pub static ref VAT_ENGLISH: Regex = Regex::new(&format!(
        r"(?i)\bVAT\s*({r})\s*%.*?({a})",
        r = RATE, a = AMOUNT
    )).unwrap();

    // Line items, most specific first; matched against a trimmed line
    pub static ref ITEM_QTY: Regex = Regex::new(&format!(
        r"^(\d+(?:,\d+)?)\s*[xX×]\s*(.+?)\s+({a})\s*(?:€|EUR)?(?:\s+[A-D])?$",
        a = AMOUNT
    )).unwrap();

    pub static ref ITEM_UNIT_PRICE: Regex = Regex::new(&format!(
        r"^(.+?)\s*@\s*({a})\s*(?:€|EUR)?\s*=\s*({a})\s*(?:€|EUR)?(?:\s+[A-D])?$",
        a = AMOUNT
    )).unwrap();

    pub static ref ITEM_SIMPLE: Regex = Regex::new(&format!(
        r"^(.+?)\s+({a})\s*(?:€|EUR)?(?:\s+[A-D])?$",
        a = AMOUNT
    )).unwrap();

    pub static ref LEADING_DIGIT: Regex = Regex::new(r"^\d").unwrap();
}
