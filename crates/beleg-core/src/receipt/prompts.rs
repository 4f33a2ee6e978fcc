//! Prompt construction for the inference passes.

use crate::models::receipt::{ReceiptCategory, ReceiptType};

use super::partial::PartialReceipt;
use super::passes::PassKind;

/// OCR text beyond this many characters is cut from prompts.
const MAX_TEXT_CHARS: usize = 5000;

/// A finished prompt and the keys its answer is expected to carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPrompt {
    pub text: String,
    pub expected_keys: &'static [&'static str],
}

/// Builds the prompt for one pass.
pub trait PromptBuilder: Send + Sync {
    /// # Arguments
    /// * `pass` - Which pass the prompt is for
    /// * `text` - OCR text of the document
    /// * `receipt_type` - Whether the user bought or sold
    /// * `hints` - Rule extraction output, to be verified by the model
    fn build(
        &self,
        pass: PassKind,
        text: &str,
        receipt_type: ReceiptType,
        hints: &PartialReceipt,
    ) -> PassPrompt;
}

/// Built-in prompts for German receipts.
#[derive(Debug, Clone)]
pub struct DefaultPrompts {
    max_text_chars: usize,
}

impl Default for DefaultPrompts {
    fn default() -> Self {
        Self {
            max_text_chars: MAX_TEXT_CHARS,
        }
    }
}

impl DefaultPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_text_chars(mut self, max: usize) -> Self {
        self.max_text_chars = max;
        self
    }

    fn document<'t>(&self, text: &'t str) -> &'t str {
        match text.char_indices().nth(self.max_text_chars) {
            Some((cut, _)) => &text[..cut],
            None => text,
        }
    }

    fn instructions(pass: PassKind, receipt_type: ReceiptType) -> String {
        let party = match receipt_type {
            ReceiptType::Purchase => "the vendor who issued the document",
            ReceiptType::Sale => "the client the document was issued to (look for \"An:\", \"Kunde:\", \"Rechnungsempfänger:\")",
        };

        match pass {
            PassKind::Metadata => format!(
                "Extract the document metadata.\n\
                 receipt_number: invoice or receipt reference, or null.\n\
                 receipt_date: date in YYYY-MM-DD format, or null. German DD.MM.YYYY becomes YYYY-MM-DD.\n\
                 category: exactly one of: {}.\n\
                 Return: {{\"receipt_number\": null, \"receipt_date\": null, \"category\": \"other\"}}",
                category_list()
            ),
            PassKind::Counterparty => format!(
                "Extract the counterparty, which is {party}.\n\
                 name: the business or person name. Never a field label; labels end with \":\".\n\
                 tax_number: German Steuernummer such as 123/456/78901, or null.\n\
                 vat_id: EU VAT ID such as DE123456789, or null.\n\
                 street (name only), street_number, postcode, city, country.\n\
                 Return: {{\"name\": null, \"vat_id\": null, \"tax_number\": null, \"street\": null, \
                 \"street_number\": null, \"postcode\": null, \"city\": null, \"country\": null}}"
            ),
            PassKind::Amounts => "Extract the amounts.\n\
                 total_amount: grand total as a decimal number. German \"1.234,56 €\" is 1234.56.\n\
                 vat_percentage: VAT rate as a number, 19.0 for 19% MwSt, or null.\n\
                 vat_amount: absolute VAT as a decimal number, or null.\n\
                 Return: {\"total_amount\": null, \"vat_percentage\": null, \"vat_amount\": null}"
                .to_string(),
            PassKind::LineItems => format!(
                "Extract every line item.\n\
                 For each: description, quantity, unit_price, total_price, vat_rate, \
                 category (one of: {}).\n\
                 Return: {{\"items\": [{{\"description\": null, \"quantity\": null, \"unit_price\": null, \
                 \"total_price\": null, \"vat_rate\": null, \"category\": \"other\"}}]}}",
                category_list()
            ),
        }
    }
}

impl PromptBuilder for DefaultPrompts {
    fn build(
        &self,
        pass: PassKind,
        text: &str,
        receipt_type: ReceiptType,
        hints: &PartialReceipt,
    ) -> PassPrompt {
        let mut prompt = String::from(
            "You extract data from German receipts and invoices. Answer with one JSON object only, \
             no markdown, no explanation.\n\n",
        );
        prompt.push_str(&Self::instructions(pass, receipt_type));
        prompt.push_str("\n\n");

        if pass == PassKind::Metadata && !hints.is_empty() {
            if let Ok(hints) = serde_json::to_string_pretty(hints) {
                prompt.push_str("Rule-based hints (verify, correct if wrong, fill in nulls):\n");
                prompt.push_str(&hints);
                prompt.push_str("\n\n");
            }
        }

        prompt.push_str("Document text:\n");
        prompt.push_str(self.document(text));
        prompt.push('\n');

        PassPrompt {
            text: prompt,
            expected_keys: pass.expected_keys(),
        }
    }
}

fn category_list() -> String {
    ReceiptCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
