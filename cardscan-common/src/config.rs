//! Configuration loading and API key resolution
//!
//! Config file lookup order:
//! 1. Explicit path (command-line argument)
//! 2. `CARDSCAN_CONFIG` environment variable
//! 3. Platform config directory: `<config_dir>/cardscan/config.toml`
//!
//! A missing file is not fatal unless the path was given explicitly; the
//! caller gets defaults and a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "CARDSCAN_CONFIG";

/// Environment variable for the vision model API key
pub const GEMINI_KEY_ENV: &str = "CARDSCAN_GEMINI_API_KEY";

/// Environment variable for the card database API key
pub const TCG_KEY_ENV: &str = "CARDSCAN_TCG_API_KEY";

/// Logging section of the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Remote service endpoint overrides (mainly for testing against stubs)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
    pub gemini_base_url: Option<String>,
    pub tcg_base_url: Option<String>,
}

/// Top-level TOML configuration
///
/// The `[scan]` table is kept raw here; `cardscan-id` owns its schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub gemini_api_key: Option<String>,
    pub tcg_api_key: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub scan: toml::Table,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Platform default config file location (may not exist)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cardscan").join("config.toml"))
}

/// Locate the config file following the lookup order in the module docs
///
/// Returns `(path, explicit)`; `explicit` is true when the caller or the
/// environment named the file.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), true));
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }

    default_config_path().filter(|p| p.exists()).map(|p| (p, false))
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Load configuration and report its source, without logging
///
/// Usable before the tracing subscriber exists, since the log level is
/// part of the result. An explicitly named file that cannot be read or
/// parsed is an error.
pub fn load_with_source(cli_arg: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    match locate_config_file(cli_arg) {
        Some((path, _explicit)) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        Some((path, true)) => Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        _ => Ok((TomlConfig::default(), ConfigSource::Defaults)),
    }
}

/// Load configuration, falling back to defaults when no file is found
pub fn load_or_default(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let (config, source) = load_with_source(cli_arg)?;
    match &source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => warn!("No config file found, using defaults"),
    }
    Ok(config)
}

/// Resolve an API key with ENV → TOML priority
///
/// Warns when both sources carry a usable key. Returns `None` if neither does.
pub fn resolve_api_key(
    label: &str,
    env_var: &str,
    toml_value: Option<&String>,
) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            "{} API key found in both environment and TOML. Using environment (highest priority).",
            label
        );
    }

    if let Some(key) = env_key {
        info!("{} API key loaded from environment variable", label);
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!("{} API key loaded from TOML config", label);
        return Some(key.clone());
    }

    None
}

/// API key must be non-empty and not only whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// User-Agent sent to remote services
pub fn get_user_agent() -> String {
    format!("cardscan/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_user_agent_format() {
        let ua = get_user_agent();
        assert!(ua.starts_with("cardscan/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    #[serial]
    fn test_source_reports_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let (config, source) = load_with_source(Some(&path)).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(source, ConfigSource::File(path.clone()));
        assert_eq!(source.to_string(), path.display().to_string());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(load_with_source(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.scan.is_empty());
    }
}
