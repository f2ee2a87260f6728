//! Runtime configuration for stree tools

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `database_path`
pub const ENV_DB_PATH: &str = "STREE_DB_PATH";
/// Environment variable overriding `busy_timeout_ms`
pub const ENV_BUSY_TIMEOUT_MS: &str = "STREE_BUSY_TIMEOUT_MS";
/// Environment variable overriding `log_filter`
pub const ENV_LOG: &str = "STREE_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreeConfig {
    /// SQLite file holding the hierarchy table
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database
    pub busy_timeout_ms: u64,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for StreeConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: 5000,
            log_filter: "info".to_string(),
        }
    }
}

impl StreeConfig {
    /// Read a JSON config file; missing fields take their defaults
    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply `STREE_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH) {
            tracing::info!("Using database path from {}: {}", ENV_DB_PATH, path);
            self.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => self.busy_timeout_ms = ms,
                Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ENV_BUSY_TIMEOUT_MS, raw, e),
            }
        }

        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        if self.busy_timeout_ms == 0 {
            return Err("busy_timeout_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// `~/.stree/database/stree.db`, or `./stree.db` without a home directory
pub fn default_database_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".stree").join("database").join("stree.db"),
        None => PathBuf::from("stree.db"),
    }
}
