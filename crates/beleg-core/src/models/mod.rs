//! Data models and configuration.

pub mod config;
pub mod receipt;

pub use config::{BelegConfig, InferenceConfig, PipelineConfig, StorageConfig};
pub use receipt::{
    Address, Counterparty, ExtractionResult, ReceiptCategory, ReceiptData, ReceiptItem,
    ReceiptType, VatSplit,
};
