//! Configuration file: provider settings plus declared resources
//!
//! ```toml
//! [provider]
//! token = "..."
//! default_ref = "main"
//!
//! [gitlab_branch.feature]
//! name = "testbranch-1"
//! project = "42"
//! ```

use anyhow::{Context, Result, bail};
use declarative::{Address, Declaration};
use gitlab_client::{ClientConfig, DEFAULT_BASE_URL, PollConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "gitlab.toml";

const PROVIDER_TABLE: &str = "provider";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_ref() -> String {
    "master".to_string()
}

fn default_delete_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    30
}

/// The `[provider]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Source ref for branches that do not declare one
    #[serde(default = "default_ref")]
    pub default_ref: String,
    /// Deadline for group deletions to become visible
    #[serde(default = "default_delete_timeout")]
    pub delete_timeout_secs: u64,
    /// Pause between deletion probes
    #[serde(default)]
    pub delete_poll_interval_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            default_ref: default_ref(),
            delete_timeout_secs: default_delete_timeout(),
            delete_poll_interval_ms: 0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ProviderSettings {
    /// Apply command-line (or environment) overrides
    pub fn with_overrides(mut self, token: Option<&str>, base_url: Option<&str>) -> Self {
        if let Some(token) = token {
            self.token = Some(token.to_string());
        }
        if let Some(url) = base_url {
            self.base_url = url.to_string();
        }
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            deletion: PollConfig::with_timeout(Duration::from_secs(self.delete_timeout_secs))
                .interval(Duration::from_millis(self.delete_poll_interval_ms)),
        }
    }
}

/// A parsed configuration file
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub provider: ProviderSettings,
    /// Declared instances in file order
    pub declarations: Vec<Declaration>,
}

impl Config {
    /// Load from `explicit`, or from the default locations
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = resolve_path(explicit)?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content, path.clone())
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} declaration(s) from {}",
            config.declarations.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse config content; `path` is recorded for messages and state lookup
    pub fn parse(content: &str, path: PathBuf) -> Result<Self> {
        let table: toml::Table = toml::from_str(content).context("Failed to parse TOML")?;

        let mut provider = ProviderSettings::default();
        let mut declarations = Vec::new();
        for (kind, instances) in table {
            if kind == PROVIDER_TABLE {
                provider = instances
                    .try_into()
                    .context("Invalid [provider] settings")?;
                continue;
            }
            let toml::Value::Table(instances) = instances else {
                bail!("[{kind}] must be a table of named resources, e.g. [{kind}.my_name]");
            };
            for (name, attributes) in instances {
                if !attributes.is_table() {
                    bail!("[{kind}.{name}] must be a table of attributes");
                }
                let config = serde_json::to_value(&attributes)
                    .with_context(|| format!("Failed to convert [{kind}.{name}]"))?;
                declarations.push(Declaration::new(Address::new(kind.clone(), name), config));
            }
        }

        Ok(Self {
            path,
            provider,
            declarations,
        })
    }

    /// State file kept next to this config: `<stem>.state.json`
    pub fn default_state_path(&self) -> PathBuf {
        self.path.with_extension("state.json")
    }
}

/// Find the config file
///
/// An explicit path wins (with `~` expanded), then `./gitlab.toml`, then
/// the user config directory.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        return Ok(PathBuf::from(expanded));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(dir) = dirs::config_dir() {
        let user = dir.join("glprov").join("config.toml");
        if user.exists() {
            return Ok(user);
        }
    }

    bail!(
        "No configuration found. Create ./{DEFAULT_CONFIG_FILE} or pass --config <path>"
    )
}
