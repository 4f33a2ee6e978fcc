//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while calling an inference endpoint.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The request could not be sent or the connection failed (includes timeouts).
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    /// The endpoint answered 200 but the body was not the expected envelope.
    #[error("invalid response body: {0}")]
    InvalidBody(String),

    /// The backend could not be constructed from its settings.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InferenceError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InferenceError::Config(_))
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            InferenceError::Status(status.as_u16())
        } else if err.is_decode() {
            InferenceError::InvalidBody(err.to_string())
        } else {
            InferenceError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(InferenceError::Transport("reset".into()).is_retryable());
        assert!(InferenceError::Status(503).is_retryable());
        assert!(InferenceError::InvalidBody("eof".into()).is_retryable());
        assert!(!InferenceError::Config("bad url".into()).is_retryable());
    }
}
