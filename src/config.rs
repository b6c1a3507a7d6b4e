//! Configuration module for p4bisect
//!
//! Loads user configuration from ~/.p4bisect/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::UndatedPolicy;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// p4 executable to spawn (default "p4")
    pub p4_bin: String,
    /// Server address, passed as `p4 -p`
    pub port: Option<String>,
    /// User name, passed as `p4 -u`
    pub user: Option<String>,
    /// Client workspace, passed as `p4 -c`
    pub client: Option<String>,
    /// What to do with records whose date cannot be parsed
    pub undated: UndatedPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            p4_bin: "p4".to_string(),
            port: None,
            user: None,
            client: None,
            undated: UndatedPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path (~/.p4bisect/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// when the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".p4bisect")
            .join("config.toml")
    }

    /// Merge CLI overrides into config
    pub fn with_overrides(mut self, p4_bin: Option<String>, undated: Option<UndatedPolicy>) -> Self {
        if let Some(bin) = p4_bin {
            self.p4_bin = bin;
        }
        if let Some(policy) = undated {
            self.undated = policy;
        }
        self
    }

    /// Create a default config file
    pub fn create_default() -> Result<()> {
        let config_path = Self::default_path();
        let config = Config::default();

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(&config)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }
}
