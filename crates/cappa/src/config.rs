//! Configuration loading and types

use std::path::{Path, PathBuf};

use cappa_pkg::InstallerConfig;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file
const CONFIG_ENV: &str = "CAPPA_CONFIG";

/// Top-level configuration for cappa
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Installer behaviour
    #[serde(default)]
    pub installer: InstallerConfig,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, `CAPPA_CONFIG`, the default paths, or
    /// fall back to defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let paths = [
            Some(PathBuf::from("cappa.toml")),
            dirs::config_dir().map(|p| p.join("cappa/cappa.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }
}
