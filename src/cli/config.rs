use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lro::PollConfig;

pub const CONFIG_FILENAME: &str = ".azcontainer.toml";

/// Optional defaults for every invocation. CLI flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub management_endpoint: Option<String>,
    /// First delay between LRO polls, in seconds.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_poll_interval_secs: Option<u64>,
    /// Give up waiting on an LRO after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// `explicit` must exist. Otherwise the working directory file, then the
    /// user config directory; no file at all yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return load_config_from_path(path);
        }

        for candidate in default_locations() {
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading config");
                return load_config_from_path(&candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn poll_config(&self, timeout_override: Option<u64>) -> PollConfig {
        let defaults = PollConfig::default();
        PollConfig {
            initial_delay: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.initial_delay),
            max_delay: self
                .max_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_delay),
            timeout: timeout_override
                .or(self.timeout_secs)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ..defaults
        }
    }
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(CONFIG_FILENAME)];
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("azcontainer").join("config.toml"));
    }
    locations
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}
