//! Runtime configuration
//!
//! A small JSON file; every field has a default so an empty object (or
//! a missing file) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root directory for the file-backed store tables
    pub data_dir: PathBuf,
    /// Base URL for named remote state
    pub state_base_url: String,
    /// Upper bound on a single remote fetch, in seconds
    pub state_fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("graphvault-data"),
            state_base_url: "http://127.0.0.1:8008/states".to_string(),
            state_fetch_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn state_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.state_fetch_timeout_secs)
    }
}
