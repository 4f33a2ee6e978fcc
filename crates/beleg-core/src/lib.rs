//! Core library for German receipt (Beleg) extraction and bookkeeping.
//!
//! This crate provides:
//! - Content identity for OCR text (normalized SHA-256)
//! - Rule-based field extraction for German receipts
//! - Multi-pass LLM extraction with validation and rules fallback
//! - SQLite persistence with deduplication
//! - UStVA (VAT return) aggregation

pub mod error;
pub mod identity;
pub mod models;
pub mod receipt;
pub mod storage;
pub mod tax;

pub use error::{BelegError, ExtractionError, Result};
pub use identity::{content_hash, normalize_text};
pub use models::{
    Address, BelegConfig, Counterparty, ExtractionResult, ReceiptCategory, ReceiptData,
    ReceiptItem, ReceiptType, VatSplit,
};
pub use receipt::{PassKind, ReceiptPipeline, RuleExtractor};
pub use storage::{ReceiptStore, ReceiptUpdate, Repository};
pub use tax::{generate_ustva, Quarter, UstvaLineItem, UstvaReport};

/// Re-export inference types.
pub use beleg_inference::{OllamaBackend, RetryPolicy, TextGenerator};
