//! Configuration loading and resolution
//!
//! Resolution priority: environment variable, then TOML config file, then
//! built-in default.
//! A missing provider API key is not an error here; the affected provider
//! is simply disabled at startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch; when false every read misses and every write no-ops
    pub enabled: bool,
    /// Path to the SQLite cache file (default: `<data dir>/cache.db`)
    pub path: Option<PathBuf>,
    /// Default TTL applied when a write does not choose a preset
    pub default_ttl_hours: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            default_ttl_hours: 168.0,
        }
    }
}

/// Per-source rate limit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_ms: u64,
}

/// TOML configuration file shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// TMDB API key; absence disables movie/TV lookups
    pub tmdb_api_key: Option<String>,
    /// Google Books API key; optional (the API accepts keyless requests
    /// at a lower quota, so absence does not disable the source)
    pub google_books_api_key: Option<String>,
    /// Master switch for the scraping-based Goodreads adapter
    pub scraping_enabled: Option<bool>,
    /// HTTP bind address for the service (default 127.0.0.1:5810)
    pub bind_address: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Per-source rate limit overrides, keyed by source tag
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,
}

/// Load the TOML config file, if one exists.
///
/// Looks for `~/.config/medley/medley-mr.toml` (platform config dir).
/// A missing file yields defaults; a malformed file is an error.
pub fn load_toml_config() -> Result<TomlConfig> {
    let Some(path) = config_file_path() else {
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Platform config file path (`None` when the config dir is unknown)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medley").join("medley-mr.toml"))
}

/// Default data directory for the cache file
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("medley"))
        .unwrap_or_else(|| PathBuf::from("./medley_data"))
}

/// Resolve a provider API key, environment first, then TOML.
///
/// Returns `None` when no valid (non-blank) key is configured. Warns when
/// both tiers carry a key, since that usually means a stale config file.
pub fn resolve_api_key(env_var: &str, toml_value: Option<&String>) -> Option<String> {
    let env_key = std::env::var(env_var).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_value.filter(|k| is_valid_key(k)).cloned();

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            env_var,
            "API key found in both environment and TOML; using environment"
        );
    }

    match env_key {
        Some(key) => {
            info!(env_var, "API key loaded from environment variable");
            Some(key)
        }
        None => {
            if toml_key.is_some() {
                info!(env_var, "API key loaded from TOML config");
            }
            toml_key
        }
    }
}

/// Validate an API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_are_invalid() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("abc123"));
    }

    #[test]
    fn toml_key_used_when_env_unset() {
        let toml_key = "from-toml".to_string();
        let resolved = resolve_api_key("MEDLEY_TEST_KEY_UNSET_XYZ", Some(&toml_key));
        assert_eq!(resolved.as_deref(), Some("from-toml"));
    }

    #[test]
    fn absent_key_resolves_to_none() {
        let resolved = resolve_api_key("MEDLEY_TEST_KEY_UNSET_XYZ", None);
        assert!(resolved.is_none());
    }

    #[test]
    fn default_cache_config_is_enabled() {
        let config = TomlConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.default_ttl_hours, 168.0);
    }

    #[test]
    fn parses_rate_limit_table() {
        let toml_src = r#"
            tmdb_api_key = "abc"

            [cache]
            enabled = false
            default_ttl_hours = 24.0

            [rate_limits.open_library]
            requests_per_window = 60
            window_ms = 60000
        "#;
        let config: TomlConfig = toml::from_str(toml_src).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(
            config.rate_limits.get("open_library").unwrap().requests_per_window,
            60
        );
    }
}
