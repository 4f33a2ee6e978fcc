//! Inference backend implementations.

pub mod ollama;

use crate::Result;

/// Trait for text-inference backends.
///
/// A backend takes one fully built prompt and returns the model's raw text
/// answer. It performs exactly one attempt; retrying is the caller's
/// concern (see [`crate::RetryPolicy`]).
pub trait TextGenerator: Send + Sync {
    /// Run one generation request.
    ///
    /// # Arguments
    /// * `prompt` - Complete prompt text, including the document
    ///
    /// # Returns
    /// The raw model output, which may or may not be valid JSON
    fn generate(&self, prompt: &str) -> Result<String>;

    /// Name of the model answering requests, for logs and artifacts.
    fn model_name(&self) -> &str;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
