//! Text-inference layer for beleg.
//!
//! This crate provides:
//! - a `TextGenerator` trait over a prompt-in, text-out inference endpoint
//! - `OllamaBackend`, a blocking client for `POST <base>/api/generate`
//! - `RetryPolicy`, the bounded retry loop shared by every extraction pass
//! - a two-stage tolerant parser for the JSON objects models return

mod backend;
mod error;
pub mod response;
mod retry;

pub use backend::TextGenerator;
pub use backend::ollama::{GenerationOptions, OllamaBackend};
pub use error::InferenceError;
pub use response::{clean_json_response, parse_by_keys, parse_response};
pub use retry::RetryPolicy;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
