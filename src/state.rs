//! Recorded state of managed resources
//!
//! Stored as JSON next to the config file. Every command that talks to
//! GitLab saves it afterwards, so instances that converged are recorded
//! even when others failed.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use declarative::{Address, Record, Tracked};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const STATE_VERSION: u32 = 1;

/// One recorded instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub id: String,
    pub attributes: Value,
}

/// The state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    /// Incremented on every save
    pub serial: u64,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            last_updated: None,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, this build understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!(
            "Loaded {} resource(s) from {} (serial {})",
            state.resources.len(),
            path.display(),
            state.serial
        );
        Ok(state)
    }

    /// Save state to disk, replacing the previous file atomically
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.serial += 1;
        self.last_updated = Some(Utc::now());

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

        log::debug!("Saved state to {} (serial {})", path.display(), self.serial);
        Ok(())
    }

    /// Recorded instances keyed by address
    pub fn tracked(&self) -> Tracked {
        self.resources
            .iter()
            .map(|entry| {
                (
                    Address::new(entry.kind.clone(), entry.name.clone()),
                    Record {
                        id: entry.id.clone(),
                        attributes: entry.attributes.clone(),
                    },
                )
            })
            .collect()
    }

    /// Replace the recorded instances
    pub fn set_tracked(&mut self, tracked: &Tracked) {
        self.resources = tracked
            .iter()
            .map(|(address, record)| StateEntry {
                kind: address.kind.clone(),
                name: address.name.clone(),
                id: record.id.clone(),
                attributes: record.attributes.clone(),
            })
            .collect();
    }
}
