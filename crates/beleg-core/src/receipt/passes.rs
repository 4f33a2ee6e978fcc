//! The four inference passes and the call/retry/parse loop they share.

use std::fmt;

use beleg_inference::{parse_response, RetryPolicy, TextGenerator};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::prompts::PassPrompt;

/// One narrow extraction pass against the inference endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Metadata,
    Counterparty,
    Amounts,
    LineItems,
}

impl PassKind {
    /// Execution order.
    pub const ALL: [PassKind; 4] = [
        PassKind::Metadata,
        PassKind::Counterparty,
        PassKind::Amounts,
        PassKind::LineItems,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Metadata => "metadata",
            PassKind::Counterparty => "counterparty",
            PassKind::Amounts => "amounts",
            PassKind::LineItems => "items",
        }
    }

    /// File name prefix for debug artifacts, e.g. `01_metadata`.
    pub fn artifact_prefix(&self) -> &'static str {
        match self {
            PassKind::Metadata => "01_metadata",
            PassKind::Counterparty => "02_counterparty",
            PassKind::Amounts => "03_amounts",
            PassKind::LineItems => "04_items",
        }
    }

    /// Top-level keys the pass asks the model for.
    pub fn expected_keys(&self) -> &'static [&'static str] {
        match self {
            PassKind::Metadata => &["receipt_number", "receipt_date", "category"],
            PassKind::Counterparty => &[
                "name",
                "vat_id",
                "tax_number",
                "street",
                "street_number",
                "postcode",
                "city",
                "country",
            ],
            PassKind::Amounts => &["total_amount", "vat_percentage", "vat_amount"],
            PassKind::LineItems => &["items"],
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    /// Model output of the successful call; `None` when every attempt failed.
    pub raw: Option<String>,
    /// Parsed object; `None` when nothing usable came back.
    pub parsed: Option<Map<String, Value>>,
    /// Calls made, including the successful one.
    pub attempts: u32,
}

impl PassOutcome {
    pub fn has_data(&self) -> bool {
        self.parsed.as_ref().is_some_and(|map| !map.is_empty())
    }
}

/// A pass bound to a generator and a retry policy.
pub struct InferencePass<'a> {
    kind: PassKind,
    generator: &'a dyn TextGenerator,
    retry: RetryPolicy,
}

impl<'a> InferencePass<'a> {
    pub fn new(kind: PassKind, generator: &'a dyn TextGenerator, retry: RetryPolicy) -> Self {
        Self { kind, generator, retry }
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Send `prompt` and parse the answer against its expected keys.
    ///
    /// Transport failures and non-success statuses are retried by the
    /// policy. Exhausted retries and unparseable answers are reported as an
    /// outcome without data, never as an error.
    pub fn run(&self, prompt: &PassPrompt) -> PassOutcome {
        let label = format!("{} pass", self.kind);
        let mut attempts = 0;

        info!("Running {} ({})", label, self.generator.model_name());

        let result = self.retry.run(&label, |attempt| {
            attempts = attempt;
            self.generator.generate(&prompt.text)
        });

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                warn!("{} produced no response after {} attempts: {}", label, attempts, err);
                return PassOutcome {
                    raw: None,
                    parsed: None,
                    attempts,
                };
            }
        };

        let parsed = parse_response(&raw, prompt.expected_keys);
        match &parsed {
            Some(map) => debug!("{} returned {} field(s)", label, map.len()),
            None => warn!("{} returned nothing usable", label),
        }

        PassOutcome {
            raw: Some(raw),
            parsed,
            attempts,
        }
    }
}
