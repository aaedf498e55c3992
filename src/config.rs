//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::index::{IndexLayout, DEFAULT_INDEX_FILE, DEFAULT_INDEX_SUFFIX};
use crate::storage::{IndexMode, StoreOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub check: CheckConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store opening configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Appended to the container name to locate its index directory
    #[serde(default = "default_index_suffix")]
    pub index_suffix: String,

    /// ID index file name inside the index directory
    #[serde(default = "default_index_file")]
    pub index_file: String,

    /// Set to false to always use the scan path
    #[serde(default = "default_use_index")]
    pub use_index: bool,
}

fn default_index_suffix() -> String {
    DEFAULT_INDEX_SUFFIX.to_string()
}

fn default_index_file() -> String {
    DEFAULT_INDEX_FILE.to_string()
}

fn default_use_index() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_suffix: default_index_suffix(),
            index_file: default_index_file(),
            use_index: default_use_index(),
        }
    }
}

impl StoreConfig {
    pub fn layout(&self) -> IndexLayout {
        IndexLayout::new(self.index_suffix.clone(), self.index_file.clone())
    }

    /// Options for `FeatureStore::open_with`
    pub fn options(&self) -> StoreOptions {
        let mode = if self.use_index {
            IndexMode::Auto
        } else {
            IndexMode::Disabled
        };
        StoreOptions::new().layout(self.layout()).index_mode(mode)
    }
}

/// Iteration counts for the `check` benchmark
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    #[serde(default = "default_indexed_iterations")]
    pub indexed_iterations: usize,

    #[serde(default = "default_scan_iterations")]
    pub scan_iterations: usize,

    #[serde(default = "default_not_found_indexed")]
    pub not_found_indexed: u64,

    #[serde(default = "default_not_found_scan")]
    pub not_found_scan: u64,
}

fn default_indexed_iterations() -> usize {
    1000
}

fn default_scan_iterations() -> usize {
    10 // scans are slow, keep the run short
}

fn default_not_found_indexed() -> u64 {
    1000
}

fn default_not_found_scan() -> u64 {
    50
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            indexed_iterations: default_indexed_iterations(),
            scan_iterations: default_scan_iterations(),
            not_found_indexed: default_not_found_indexed(),
            not_found_scan: default_not_found_scan(),
        }
    }
}

impl CheckConfig {
    pub fn iterations(&self, indexed: bool) -> usize {
        if indexed {
            self.indexed_iterations
        } else {
            self.scan_iterations
        }
    }

    pub fn not_found_iterations(&self, indexed: bool) -> u64 {
        if indexed {
            self.not_found_indexed
        } else {
            self.not_found_scan
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("gol-lookup").join("config.toml")),
            Some(PathBuf::from("/etc/gol-lookup/config.toml")),
            Some(PathBuf::from("./gol-lookup.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Explicit file if given, default search otherwise
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Store options derived from the `[store]` section
    pub fn options(&self) -> StoreOptions {
        self.store.options()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Store overrides
        if let Ok(suffix) = std::env::var("GOL_INDEX_SUFFIX") {
            self.store.index_suffix = suffix;
        }
        if let Ok(file) = std::env::var("GOL_INDEX_FILE") {
            self.store.index_file = file;
        }
        if let Ok(use_index) = std::env::var("GOL_USE_INDEX") {
            if let Some(b) = parse_bool(&use_index) {
                self.store.use_index = b;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("GOL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("GOL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# gol-lookup Configuration
#
# Environment variables override these settings:
# - GOL_INDEX_SUFFIX
# - GOL_INDEX_FILE
# - GOL_USE_INDEX
# - GOL_LOG_LEVEL
# - GOL_LOG_FORMAT

[store]
# Index directory = container path minus ".gol" plus this suffix
index_suffix = "-indexes"

# ID index file inside the index directory
index_file = "ids.idx"

# Use the ID index when present (false forces a full scan)
use_index = true

[check]
# Repeated lookups per known feature
indexed_iterations = 1000
scan_iterations = 10

# Node IDs 1..=N looked up for the not-found benchmark
not_found_indexed = 1000
not_found_scan = 50

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.store.index_suffix, "-indexes");
        assert_eq!(config.store.index_file, "ids.idx");
        assert!(config.store.use_index);
        assert_eq!(config.check.indexed_iterations, 1000);
        assert_eq!(config.check.not_found_scan, 50);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[store]\nuse_index = false\n").unwrap();
        assert!(!config.store.use_index);
        assert_eq!(config.store.index_suffix, "-indexes");
        assert_eq!(config.check.scan_iterations, 10);
        assert_eq!(config.options().index_mode, IndexMode::Disabled);
    }

    #[test]
    fn test_store_options() {
        let store = StoreConfig {
            index_suffix: ".idx".into(),
            index_file: "by-id".into(),
            use_index: true,
        };
        let options = store.options();
        assert_eq!(options.index_mode, IndexMode::Auto);
        assert_eq!(options.layout, IndexLayout::new(".idx", "by-id"));
    }

    #[test]
    fn test_check_iterations() {
        let check = CheckConfig::default();
        assert_eq!(check.iterations(true), 1000);
        assert_eq!(check.iterations(false), 10);
        assert_eq!(check.not_found_iterations(true), 1000);
        assert_eq!(check.not_found_iterations(false), 50);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[store\n").unwrap();
        assert!(matches!(Config::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
