//! Configuration management for the SMC scanner.
//!
//! The scanner reads a configuration file at `~/.smc-scanner/config.json`.
//! Module-specific settings live in sibling files (e.g. `screener.json`)
//! and are loaded with [`load_section`].
//!
//! # Configuration Priority
//!
//! 1. Environment variables (SMC_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `SMC_LOG_LEVEL` → observability.log_level
//! - `SMC_LOG_FORMAT` → observability.log_format
//! - `SMC_DB_PATH` → data.db_path
//! - `SMC_THEME_FILE` → data.theme_file

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".smc-scanner"),
        |dirs| dirs.home_dir().join(".smc-scanner"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets forced to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Data Configuration
// ============================================================================

/// Market data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// SQLite database holding candles, quotes and the ticker list.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// JSON file mapping ticker codes to theme tags.
    #[serde(default = "default_theme_file")]
    pub theme_file: PathBuf,

    /// Lifetime of memoized provider responses, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,

    /// Number of tickers evaluated concurrently in per-ticker stages.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            theme_file: default_theme_file(),
            cache_ttl_secs: default_cache_ttl_secs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_db_path() -> PathBuf {
    config_dir().join("market.db")
}

fn default_theme_file() -> PathBuf {
    config_dir().join("stock_themes.json")
}

fn default_cache_ttl_secs() -> i64 {
    15 * 60
}

fn default_concurrency() -> usize {
    8
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Data sources
    #[serde(default)]
    pub data: DataConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SMC_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("SMC_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Ok(path) = std::env::var("SMC_DB_PATH") {
            self.data.db_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("SMC_THEME_FILE") {
            self.data.theme_file = PathBuf::from(path);
        }
    }
}

// ============================================================================
// Modular Sections
// ============================================================================

/// Load a module section (e.g. `screener.json`) from the config directory.
///
/// A missing file yields `T::default()`; a malformed one is an error.
pub fn load_section<T: DeserializeOwned + Default>(file_name: &str) -> Result<T> {
    load_section_from(&config_dir(), file_name)
}

/// Load a module section from an explicit directory.
pub fn load_section_from<T: DeserializeOwned + Default>(dir: &Path, file_name: &str) -> Result<T> {
    let path = dir.join(file_name);
    if !path.exists() {
        tracing::debug!(file = %path.display(), "Section file not found, using defaults");
        return Ok(T::default());
    }

    let content = fs::read_to_string(&path)
        .context(format!("Failed to read {}", path.display()))?;
    let section = serde_json::from_str(&content)
        .context(format!("Failed to parse {}", path.display()))?;

    tracing::debug!(file = %path.display(), "Loaded config section");
    Ok(section)
}
