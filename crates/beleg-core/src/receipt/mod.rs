//! Receipt extraction: rules, inference passes, validation and the pipeline
//! that ties them together.

mod debug;
mod partial;
pub mod passes;
mod pipeline;
pub mod prompts;
pub mod rules;
pub mod validators;

pub use debug::DebugArtifacts;
pub use partial::{PartialCounterparty, PartialReceipt};
pub use passes::{InferencePass, PassKind, PassOutcome};
pub use pipeline::ReceiptPipeline;
pub use prompts::{DefaultPrompts, PassPrompt, PromptBuilder};
pub use rules::{FieldExtractor, RuleExtractor};
