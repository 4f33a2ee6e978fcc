//! Ollama `/api/generate` backend using a blocking HTTP client.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InferenceError;
use crate::{Result, TextGenerator};

/// Sampling options forwarded verbatim in the request body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_ctx: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            num_ctx: 4096,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerationOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Backend talking to a local Ollama server.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    options: GenerationOptions,
}

impl OllamaBackend {
    /// Create a backend for `model` served at `base_url`.
    ///
    /// `timeout` bounds each individual request, connect included.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(InferenceError::Config("base URL is empty".to_string()));
        }
        if model.trim().is_empty() {
            return Err(InferenceError::Config("model name is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("beleg/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            options: GenerationOptions::default(),
        })
    }

    /// Set sampling options.
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Full URL of the generate endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl TextGenerator for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        };

        debug!("POST {} ({} prompt chars)", self.endpoint(), prompt.len());

        let response = self.client.post(self.endpoint()).json(&body).send()?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| InferenceError::InvalidBody(e.to_string()))?;

        debug!("Received {} response chars", parsed.response.len());

        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
