//! Configuration management for the sync agent.
//!
//! Loads configuration from a TOML file. Every section has defaults, so an
//! empty file (or no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Server root that every download locator is built from
    pub base_url: String,

    /// Location of the version manifest, relative to `base_url`
    pub manifest_path: String,

    /// Leading manifest segment the public server layout omits
    pub root_prefix: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory the manifest hierarchy is mirrored into
    pub mirror_dir: PathBuf,

    /// Leaf key suffixes that name downloadable files (case-insensitive)
    pub extensions: Vec<String>,

    /// Sub-trees to diff; empty means the whole manifest
    pub scopes: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Persisted snapshot of the last synced manifest
    pub version_file: PathBuf,

    /// Suffix appended to `version_file` for its backup copy
    pub backup_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Factor applied to the delay after every retry
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://seerh5.61.com".to_string(),
            manifest_path: "version/version.json".to_string(),
            root_prefix: Some("files".to_string()),
            timeout_secs: 10,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mirror_dir: PathBuf::from("."),
            extensions: vec![".json".to_string(), ".xml".to_string()],
            scopes: Vec::new(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version_file: PathBuf::from("version.json"),
            backup_suffix: ".backup".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StoreConfig {
    /// Location of the backup copy, a sibling of the version file.
    pub fn backup_file(&self) -> PathBuf {
        let mut name = self.version_file.as_os_str().to_os_string();
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request or write fail.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.remote.base_url.trim().is_empty() {
            anyhow::bail!("remote.base_url must not be empty");
        }
        if self.sync.extensions.is_empty() {
            anyhow::bail!("sync.extensions must list at least one suffix");
        }
        if self.store.backup_suffix.is_empty() {
            anyhow::bail!("store.backup_suffix must not be empty");
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier >= 1.0) {
            anyhow::bail!("retry.backoff_multiplier must be a finite number >= 1.0");
        }
        Ok(())
    }
}
