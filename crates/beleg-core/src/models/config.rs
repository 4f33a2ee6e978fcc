//! Configuration structures for the extraction pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use beleg_inference::{GenerationOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BelegError, Result};
use crate::models::receipt::ReceiptType;

/// Main configuration for beleg.
///
/// Built once at process start and passed by reference to the components
/// that need it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BelegConfig {
    /// Inference endpoint settings.
    pub inference: InferenceConfig,

    /// Pipeline behaviour.
    pub pipeline: PipelineConfig,

    /// Receipt database.
    pub storage: StorageConfig,
}

/// Settings for the Ollama-compatible inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL; `/api/generate` is appended.
    pub base_url: String,

    /// Model tag passed to the endpoint.
    pub model: String,

    /// Sampling temperature (0.0 - 2.0). Extraction wants 0.
    pub temperature: f32,

    /// Nucleus sampling cutoff (0.0 - 1.0).
    pub top_p: f32,

    /// Context window in tokens.
    pub num_ctx: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Attempts per pass, including the first.
    pub max_retries: u32,

    /// Fixed pause between attempts in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b-instruct-q4_K_M".to_string(),
            temperature: 0.0,
            top_p: 1.0,
            num_ctx: 4096,
            timeout_secs: 60,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            num_ctx: self.num_ctx,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Receipt type assumed when the caller does not specify one.
    pub default_receipt_type: ReceiptType,

    /// Write prompts, raw responses and parsed pass output to disk.
    pub debug_artifacts: bool,

    /// Root for debug artifacts; one sub-directory per receipt id.
    pub debug_dir: Option<PathBuf>,
}

/// Receipt database location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. `None` lets the caller pick a platform default.
    pub db_path: Option<PathBuf>,
}

impl BelegConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `BELEG_*` environment variables on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable numbers are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BELEG_OLLAMA_BASE_URL") {
            self.inference.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("BELEG_AGENT_MODEL") {
            self.inference.model = model;
        }
        if let Some(raw) = lookup("BELEG_AGENT_TIMEOUT") {
            match raw.trim().parse() {
                Ok(secs) => self.inference.timeout_secs = secs,
                Err(_) => warn!("Ignoring BELEG_AGENT_TIMEOUT={:?}: not a number", raw),
            }
        }
        if let Some(raw) = lookup("BELEG_AGENT_MAX_RETRIES") {
            match raw.trim().parse() {
                Ok(n) => self.inference.max_retries = n,
                Err(_) => warn!("Ignoring BELEG_AGENT_MAX_RETRIES={:?}: not a number", raw),
            }
        }
        if let Some(path) = lookup("BELEG_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("BELEG_DEBUG_DIR") {
            self.pipeline.debug_dir = Some(PathBuf::from(path));
            self.pipeline.debug_artifacts = true;
        }
    }

    /// Check value ranges and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let inf = &self.inference;

        if inf.base_url.trim().is_empty() {
            issues.push("inference.base_url is empty".to_string());
        }
        if inf.model.trim().is_empty() {
            issues.push("inference.model is empty".to_string());
        }
        if !(0.0..=2.0).contains(&inf.temperature) {
            issues.push(format!("inference.temperature {} is outside 0.0-2.0", inf.temperature));
        }
        if !(0.0..=1.0).contains(&inf.top_p) {
            issues.push(format!("inference.top_p {} is outside 0.0-1.0", inf.top_p));
        }
        if inf.num_ctx < 512 {
            issues.push(format!("inference.num_ctx {} is below 512", inf.num_ctx));
        }
        if inf.timeout_secs == 0 {
            issues.push("inference.timeout_secs must be positive".to_string());
        }
        if inf.max_retries > 10 {
            issues.push(format!("inference.max_retries {} is above 10", inf.max_retries));
        }

        issues
    }

    /// Like [`validate`](Self::validate), as a `Result`.
    pub fn ensure_valid(&self) -> Result<()> {
        let issues = self.validate();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(BelegError::Config(issues.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = BelegConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.inference.base_url, "http://localhost:11434");
        assert_eq!(config.pipeline.default_receipt_type, ReceiptType::Purchase);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: BelegConfig =
            serde_json::from_str(r#"{"inference": {"model": "llama3.2"}}"#).unwrap();
        assert_eq!(config.inference.model, "llama3.2");
        assert_eq!(config.inference.num_ctx, 4096);
        assert_eq!(config.storage.db_path, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = BelegConfig::default();
        config.inference.max_retries = 4;
        config.pipeline.default_receipt_type = ReceiptType::Sale;
        config.save(&path).unwrap();

        assert_eq!(BelegConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("BELEG_OLLAMA_BASE_URL", "http://gpu-box:11434/"),
            ("BELEG_AGENT_MODEL", "mistral"),
            ("BELEG_AGENT_TIMEOUT", "120"),
            ("BELEG_AGENT_MAX_RETRIES", "many"),
            ("BELEG_DEBUG_DIR", "/tmp/beleg-debug"),
        ]
        .into_iter()
        .collect();

        let mut config = BelegConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.inference.base_url, "http://gpu-box:11434");
        assert_eq!(config.inference.model, "mistral");
        assert_eq!(config.inference.timeout_secs, 120);
        assert_eq!(config.inference.max_retries, 2);
        assert!(config.pipeline.debug_artifacts);
        assert_eq!(config.pipeline.debug_dir, Some(PathBuf::from("/tmp/beleg-debug")));
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = BelegConfig::default();
        config.inference.temperature = 2.5;
        config.inference.top_p = -0.1;
        config.inference.num_ctx = 128;
        config.inference.timeout_secs = 0;
        config.inference.max_retries = 11;

        assert_eq!(config.validate().len(), 5);
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = InferenceConfig {
            max_retries: 3,
            retry_delay_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.retry_policy(), RetryPolicy::new(3, Duration::from_millis(250)));
    }
}
