//! Configuration loading and types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use watchpost_core::CredentialPaths;

/// Top-level configuration for the watchpost agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Collector endpoint
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Credential file locations
    #[serde(default)]
    pub credentials: CredentialPaths,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Base URL of the collector, e.g. `https://collector.example:8443`
    pub url: Option<String>,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
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
            .map_err(|e| eyre::eyre!("read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be read or parsed
    pub fn load_default() -> eyre::Result<Self> {
        // Check environment variable
        if let Ok(path) = std::env::var("WATCHPOST_CONFIG") {
            return Self::load(Path::new(&path));
        }

        for path in Self::search_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        // Logging is not up yet
        eprintln!("watchpost: no config file found, using defaults");
        Ok(Config::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("watchpost.toml"),
            PathBuf::from("/etc/watchpost/watchpost.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("watchpost/watchpost.toml"));
        }
        paths
    }

    /// The collector URL, which has no default
    ///
    /// # Errors
    /// Returns error if `collector.url` is not set
    pub fn collector_url(&self) -> eyre::Result<&str> {
        self.collector
            .url
            .as_deref()
            .ok_or_else(|| eyre::eyre!("collector.url is not set"))
    }
}
