//! Per-receipt debug artifacts: prompts, raw answers and parsed output.
//!
//! Purely observational. Nothing here is read back, and a failed write
//! never affects the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::partial::PartialReceipt;
use super::passes::{PassKind, PassOutcome};

/// Writes artifacts into `<root>/<receipt id>/`.
#[derive(Debug, Clone)]
pub struct DebugArtifacts {
    dir: PathBuf,
}

impl DebugArtifacts {
    /// Create the receipt directory. Returns `None` if that fails.
    pub fn create(root: &Path, receipt_id: &str) -> Option<Self> {
        let dir = root.join(receipt_id);
        match fs::create_dir_all(&dir) {
            Ok(()) => {
                debug!("Writing debug artifacts to {}", dir.display());
                Some(Self { dir })
            }
            Err(err) => {
                warn!("Cannot create debug directory {}: {}", dir.display(), err);
                None
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn rules(&self, text: &str, extracted: &PartialReceipt) {
        self.write("00_rules_input.txt", text);
        self.write_json("00_rules_output.json", extracted);
    }

    pub fn pass(&self, kind: PassKind, prompt: &str, outcome: &PassOutcome) {
        let prefix = kind.artifact_prefix();

        self.write(&format!("{prefix}_prompt.txt"), prompt);

        let raw = match &outcome.raw {
            Some(raw) => raw.clone(),
            None => format!("FAILED after {} attempts", outcome.attempts),
        };
        self.write(&format!("{prefix}_raw.txt"), &raw);

        let name = format!("{prefix}_parsed.json");
        match &outcome.parsed {
            Some(parsed) => self.write_json(&name, parsed),
            None => self.write_json(&name, &serde_json::json!({ "_error": "parse_failed" })),
        }
    }

    pub fn final_result(&self, merged: &PartialReceipt) {
        self.write_json("final.json", merged);
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => self.write(name, &json),
            Err(err) => warn!("Cannot serialize debug artifact {}: {}", name, err),
        }
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.dir.join(name);
        if let Err(err) = fs::write(&path, contents) {
            warn!("Cannot write debug artifact {}: {}", path.display(), err);
        }
    }
}
