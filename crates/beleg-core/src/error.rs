//! Error types for the beleg-core library.

use thiserror::Error;

/// Main error type for the beleg library.
#[derive(Error, Debug)]
pub enum BelegError {
    /// The OCR output held no text at all.
    #[error("no text could be extracted from the document")]
    NoText,

    /// Receipt extraction or validation error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] beleg_inference::InferenceError),

    /// Database error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to receipt field extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Field validation failed.
    #[error("validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The assembled receipt failed its sanity checks.
    #[error("receipt failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// Failed to parse a value.
    #[error("failed to parse {field}: {value}")]
    Parse { field: String, value: String },

    /// No receipt data could be extracted.
    #[error("no receipt data found")]
    NoData,
}

/// Result type for the beleg library.
pub type Result<T> = std::result::Result<T, BelegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_lists_every_issue() {
        let err = BelegError::from(ExtractionError::Invalid(vec![
            "Total amount 0 is not positive".into(),
            "VAT amount 5 exceeds total 0".into(),
        ]));
        assert_eq!(
            err.to_string(),
            "extraction error: receipt failed validation: Total amount 0 is not positive; VAT amount 5 exceeds total 0"
        );
    }
}
