//! Service-level configuration
//!
//! Assembles the runtime configuration from environment variables and the
//! shared TOML file. Provider keys resolve env-over-TOML; a missing
//! required key disables that provider's adapter instead of erroring.

use medley_common::config::{
    default_data_dir, load_toml_config, resolve_api_key, CacheConfig, RateLimitConfig, TomlConfig,
};
use medley_common::Result;
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5810";

pub const TMDB_KEY_ENV: &str = "MEDLEY_TMDB_API_KEY";
pub const GOOGLE_BOOKS_KEY_ENV: &str = "MEDLEY_GOOGLE_BOOKS_API_KEY";

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_address: String,
    /// Required for movie/TV lookups; absence disables the TMDB adapter
    pub tmdb_api_key: Option<String>,
    /// Optional; keyless Google Books requests run at a lower quota
    pub google_books_api_key: Option<String>,
    pub scraping_enabled: bool,
    pub cache: CacheConfig,
    /// Effective per-source limits: defaults overlaid with TOML overrides
    pub rate_limits: HashMap<String, RateLimitConfig>,
}

impl ServiceConfig {
    pub fn load() -> Result<Self> {
        Ok(Self::from_toml(load_toml_config()?))
    }

    pub fn from_toml(toml: TomlConfig) -> Self {
        let mut rate_limits = default_rate_limits();
        for (source, limit) in toml.rate_limits {
            rate_limits.insert(source, limit);
        }

        Self {
            bind_address: toml
                .bind_address
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            tmdb_api_key: resolve_api_key(TMDB_KEY_ENV, toml.tmdb_api_key.as_ref()),
            google_books_api_key: resolve_api_key(
                GOOGLE_BOOKS_KEY_ENV,
                toml.google_books_api_key.as_ref(),
            ),
            scraping_enabled: toml.scraping_enabled.unwrap_or(true),
            cache: toml.cache,
            rate_limits,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("cache.db"))
    }
}

/// Published or commonly observed limits for each provider
fn default_rate_limits() -> HashMap<String, RateLimitConfig> {
    HashMap::from([
        (
            "open_library".to_string(),
            RateLimitConfig { requests_per_window: 60, window_ms: 60_000 },
        ),
        (
            "google_books".to_string(),
            RateLimitConfig { requests_per_window: 100, window_ms: 60_000 },
        ),
        (
            "goodreads".to_string(),
            RateLimitConfig { requests_per_window: 10, window_ms: 60_000 },
        ),
        (
            "tmdb".to_string(),
            RateLimitConfig { requests_per_window: 40, window_ms: 10_000 },
        ),
    ])
}
