//! Counterparty name candidate from the receipt header.

use super::patterns::{LEADING_DIGIT, SKIP_HEADER_WORDS};

/// Lines of the header that are searched for a name.
const HEADER_LINES: usize = 8;

/// First plausible business name among the top non-empty lines.
///
/// Skips lines that start with a digit (dates, amounts, postcodes), are
/// shorter than three characters, or contain receipt boilerplate.
pub fn extract_counterparty_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(HEADER_LINES)
        .find(|line| {
            let lower = line.to_lowercase();
            !LEADING_DIGIT.is_match(line)
                && line.chars().count() >= 3
                && !SKIP_HEADER_WORDS.iter().any(|w| lower.contains(w))
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_boilerplate_and_numbers() {
        let text = "\n  KASSENBON  \n12.03.2024 10:15\nAB\nBäckerei Schmidt GmbH\nHauptstr. 1";
        assert_eq!(extract_counterparty_name(text), Some("Bäckerei Schmidt GmbH".to_string()));
    }

    #[test]
    fn test_only_header_is_searched() {
        let mut text = "1\n".repeat(8);
        text.push_str("Late Name GmbH");
        assert_eq!(extract_counterparty_name(&text), None);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_counterparty_name(""), None);
    }
}
