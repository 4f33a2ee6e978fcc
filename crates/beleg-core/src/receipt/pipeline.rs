//! Extraction pipeline: rules, four inference passes, validation, storage.

use std::path::{Path, PathBuf};
use std::time::Instant;

use beleg_inference::{OllamaBackend, RetryPolicy, TextGenerator};
use tracing::{error, info, warn};

use crate::error::{BelegError, ExtractionError, Result};
use crate::identity::content_hash;
use crate::models::config::BelegConfig;
use crate::models::receipt::{ExtractionResult, ReceiptData, ReceiptType};
use crate::storage::ReceiptStore;

use super::debug::DebugArtifacts;
use super::partial::PartialReceipt;
use super::passes::{InferencePass, PassKind};
use super::prompts::{DefaultPrompts, PromptBuilder};
use super::rules::RuleExtractor;
use super::validators;

/// Turns OCR text into a validated [`ReceiptData`].
///
/// The passes run one after another against the same generator. When none
/// of them yields anything, the rule extraction result is used instead.
pub struct ReceiptPipeline {
    generator: Box<dyn TextGenerator>,
    prompts: Box<dyn PromptBuilder>,
    rules: RuleExtractor,
    retry: RetryPolicy,
    debug_root: Option<PathBuf>,
}

impl ReceiptPipeline {
    pub fn new(generator: impl TextGenerator + 'static, retry: RetryPolicy) -> Self {
        Self {
            generator: Box::new(generator),
            prompts: Box::new(DefaultPrompts::new()),
            rules: RuleExtractor::new(),
            retry,
            debug_root: None,
        }
    }

    /// Pipeline talking to the Ollama endpoint named in `config`.
    pub fn from_config(config: &BelegConfig) -> Result<Self> {
        let inference = &config.inference;
        let backend = OllamaBackend::new(&inference.base_url, &inference.model, inference.timeout())?
            .with_options(inference.generation_options());

        let debug_root = if config.pipeline.debug_artifacts {
            config.pipeline.debug_dir.clone()
        } else {
            None
        };

        Ok(Self::new(backend, inference.retry_policy()).with_debug_dir(debug_root))
    }

    pub fn with_prompts(mut self, prompts: impl PromptBuilder + 'static) -> Self {
        self.prompts = Box::new(prompts);
        self
    }

    /// Write per-receipt artifacts below `root`; `None` disables them.
    pub fn with_debug_dir(mut self, root: Option<PathBuf>) -> Self {
        self.debug_root = root;
        self
    }

    pub fn debug_dir(&self) -> Option<&Path> {
        self.debug_root.as_deref()
    }

    /// Extract and validate a receipt without touching storage.
    ///
    /// # Errors
    /// [`BelegError::NoText`] for blank input, and
    /// [`ExtractionError::Invalid`] when the assembled record fails its
    /// sanity checks.
    pub fn extract(&self, text: &str, receipt_type: ReceiptType) -> Result<ReceiptData> {
        if text.trim().is_empty() {
            return Err(BelegError::NoText);
        }

        let id = content_hash(text);
        let artifacts = self
            .debug_root
            .as_deref()
            .and_then(|root| DebugArtifacts::create(root, &id));

        let hints = self.rules.extract(text);
        if let Some(artifacts) = &artifacts {
            artifacts.rules(text, &hints);
        }

        let mut merged = PartialReceipt::default();
        for pass in PassKind::ALL {
            let prompt = self.prompts.build(pass, text, receipt_type, &hints);
            let outcome = InferencePass::new(pass, &*self.generator, self.retry).run(&prompt);

            if let Some(artifacts) = &artifacts {
                artifacts.pass(pass, &prompt.text, &outcome);
            }
            if let Some(parsed) = &outcome.parsed {
                validators::apply(pass, parsed, &mut merged);
            }
        }

        if merged.is_empty() {
            warn!("No pass produced usable data for {}, using rule extraction", short_id(&id));
            merged = hints;
        }

        if let Some(artifacts) = &artifacts {
            artifacts.final_result(&merged);
        }

        let receipt = merged.into_receipt(text, receipt_type);
        let issues = receipt.validate();
        if !issues.is_empty() {
            warn!("Receipt {} failed validation: {}", short_id(&id), issues.join("; "));
            return Err(ExtractionError::Invalid(issues).into());
        }

        Ok(receipt)
    }

    /// Run the whole pipeline and report the outcome.
    ///
    /// With a store, text that is already stored short-circuits to a
    /// duplicate result and a new receipt is saved. Errors are reported in
    /// the result, never returned.
    pub fn process(
        &self,
        text: &str,
        receipt_type: ReceiptType,
        store: Option<&dyn ReceiptStore>,
    ) -> ExtractionResult {
        let start = Instant::now();
        let elapsed = || start.elapsed().as_millis() as u64;

        if text.trim().is_empty() {
            return ExtractionResult::failed(BelegError::NoText.to_string(), elapsed());
        }

        let id = content_hash(text);

        if let Some(store) = store {
            match store.exists(&id) {
                Ok(true) => {
                    info!("Receipt {} already stored, skipping extraction", short_id(&id));
                    let existing = store.get(&id).unwrap_or_else(|err| {
                        warn!("Cannot load stored receipt {}: {}", short_id(&id), err);
                        None
                    });
                    return ExtractionResult::duplicate(existing, id, elapsed());
                }
                Ok(false) => {}
                Err(err) => {
                    error!("Duplicate check failed: {}", err);
                    return ExtractionResult::failed(err.to_string(), elapsed());
                }
            }
        }

        let receipt = match self.extract(text, receipt_type) {
            Ok(receipt) => receipt,
            Err(err) => return ExtractionResult::failed(err.to_string(), elapsed()),
        };

        if let Some(store) = store {
            match store.save(&receipt) {
                Ok(true) => {}
                Ok(false) => {
                    let existing = store.get(&receipt.id).ok().flatten();
                    return ExtractionResult::duplicate(existing, receipt.id, elapsed());
                }
                Err(err) => {
                    error!("Saving receipt {} failed: {}", short_id(&receipt.id), err);
                    return ExtractionResult::failed(err.to_string(), elapsed());
                }
            }
        }

        info!(
            "Extracted receipt {} in {} ms ({} items)",
            short_id(&receipt.id),
            elapsed(),
            receipt.items.len()
        );
        ExtractionResult::ok(receipt, elapsed())
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::ReceiptCategory;
    use crate::storage::Repository;
    use beleg_inference::InferenceError;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::time::Duration;

    use crate::receipt::prompts::PassPrompt;

    const RECEIPT: &str = "\
Elektro Meier GmbH
Datum: 14.02.2024
Kabel 50,00 €
Monitor 899,00 €
19% MwSt 151,52 €
Gesamtbetrag 949,00 €";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Prompts that are just the pass name, so the generator can tell passes apart.
    struct NamePrompts;

    impl PromptBuilder for NamePrompts {
        fn build(&self, pass: PassKind, _: &str, _: ReceiptType, _: &PartialReceipt) -> PassPrompt {
            PassPrompt {
                text: pass.name().to_string(),
                expected_keys: pass.expected_keys(),
            }
        }
    }

    /// Answers per pass name; passes without an answer fail at transport level.
    struct ByPass(HashMap<&'static str, &'static str>);

    impl TextGenerator for ByPass {
        fn generate(&self, prompt: &str) -> beleg_inference::Result<String> {
            self.0
                .get(prompt)
                .map(|reply| reply.to_string())
                .ok_or_else(|| InferenceError::Transport("connection refused".into()))
        }

        fn model_name(&self) -> &str {
            "by-pass"
        }
    }

    fn pipeline(replies: &[(&'static str, &'static str)]) -> ReceiptPipeline {
        let generator = ByPass(replies.iter().copied().collect());
        ReceiptPipeline::new(generator, RetryPolicy::new(2, Duration::ZERO)).with_prompts(NamePrompts)
    }

    fn all_passes() -> ReceiptPipeline {
        pipeline(&[
            ("metadata", r#"{"receipt_number": "R-77", "receipt_date": "2024-02-14", "category": "equipment"}"#),
            ("counterparty", r#"{"name": "Elektro Meier GmbH", "vat_id": "DE811111111", "city": "München"}"#),
            ("amounts", "```json\n{\"total_amount\": 949.0, \"vat_percentage\": 19, \"vat_amount\": 151.52,}\n```"),
            ("items", r#"{"items": [{"description": "Monitor", "total_price": 899.0, "vat_rate": 19}]}"#),
        ])
    }

    #[test]
    fn test_passes_are_merged() {
        let receipt = all_passes().extract(RECEIPT, ReceiptType::Purchase).unwrap();

        assert_eq!(receipt.id, content_hash(RECEIPT));
        assert_eq!(receipt.receipt_number.as_deref(), Some("R-77"));
        assert_eq!(receipt.category, ReceiptCategory::Equipment);
        assert_eq!(receipt.total_amount, Some(dec("949")));
        assert_eq!(receipt.vat_amount, Some(dec("151.52")));
        let cp = receipt.counterparty.unwrap();
        assert_eq!(cp.vat_id.as_deref(), Some("DE811111111"));
        assert_eq!(cp.address.city.as_deref(), Some("München"));
        assert_eq!(receipt.items.len(), 1);
        assert_eq!(receipt.items[0].position, Some(1));
    }

    #[test]
    fn test_falls_back_to_rules_when_every_pass_fails() {
        let receipt = pipeline(&[]).extract(RECEIPT, ReceiptType::Purchase).unwrap();

        assert_eq!(receipt.total_amount, Some(dec("949.00")));
        assert_eq!(receipt.vat_percentage, Some(dec("19")));
        assert_eq!(
            receipt.counterparty.and_then(|cp| cp.name).as_deref(),
            Some("Elektro Meier GmbH")
        );
        assert_eq!(receipt.items.len(), 2);
    }

    #[test]
    fn test_partial_pass_data_is_not_replaced() {
        let receipt = pipeline(&[("counterparty", r#"{"name": "Elektro Meier GmbH"}"#)])
            .extract(RECEIPT, ReceiptType::Sale)
            .unwrap();

        assert_eq!(receipt.receipt_type, ReceiptType::Sale);
        assert!(receipt.counterparty.is_some());
        assert_eq!(receipt.total_amount, None);
        assert!(receipt.items.is_empty());
    }

    #[test]
    fn test_blank_text_is_no_text() {
        let err = pipeline(&[]).extract(" \n\t\n", ReceiptType::Purchase).unwrap_err();
        assert!(matches!(err, BelegError::NoText));

        let result = pipeline(&[]).process("", ReceiptType::Purchase, None);
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("no text"));
    }

    #[test]
    fn test_future_date_fails_and_is_not_stored() {
        let repo = Repository::open_in_memory().unwrap();
        let pipeline = pipeline(&[("metadata", r#"{"receipt_date": "2999-01-01"}"#)]);

        let result = pipeline.process(RECEIPT, ReceiptType::Purchase, Some(&repo));

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("in the future"));
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_second_submission_is_duplicate() {
        let repo = Repository::open_in_memory().unwrap();
        let pipeline = all_passes();

        let first = pipeline.process(RECEIPT, ReceiptType::Purchase, Some(&repo));
        assert!(first.success);
        assert!(!first.duplicate);

        // Per-line whitespace does not change the identity
        let reformatted = RECEIPT.replace('\n', "  \r\n   ");
        let second = pipeline.process(&reformatted, ReceiptType::Purchase, Some(&repo));

        assert!(second.success);
        assert!(second.duplicate);
        assert_eq!(second.existing_id.as_deref(), Some(content_hash(RECEIPT).as_str()));
        assert_eq!(second.data.unwrap().receipt_number.as_deref(), Some("R-77"));
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_debug_artifacts_written() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = pipeline(&[("amounts", r#"{"total_amount": 949}"#)])
            .with_debug_dir(Some(root.path().to_path_buf()));

        pipeline.extract(RECEIPT, ReceiptType::Purchase).unwrap();

        let dir = root.path().join(content_hash(RECEIPT));
        for name in [
            "00_rules_input.txt",
            "00_rules_output.json",
            "01_metadata_raw.txt",
            "03_amounts_parsed.json",
            "04_items_prompt.txt",
            "final.json",
        ] {
            assert!(dir.join(name).exists(), "missing {name}");
        }
        let raw = std::fs::read_to_string(dir.join("01_metadata_raw.txt")).unwrap();
        assert_eq!(raw, "FAILED after 2 attempts");
    }
}
