//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (APPSHELF_*)
//! 2. TOML config file (if APPSHELF_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (APPSHELF_*)
/// 2. TOML config file (if APPSHELF_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the realtime database, e.g. `https://example-rtdb.firebaseio.com`.
    ///
    /// Set via APPSHELF_DATABASE_URL environment variable.
    /// Required only when connecting to the remote store.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Path of the catalog document inside the database.
    ///
    /// Set via APPSHELF_DOCUMENT_PATH environment variable.
    #[serde(default = "default_document_path")]
    pub document_path: String,

    /// Path to the SQLite cache database.
    ///
    /// Set via APPSHELF_CACHE_PATH environment variable.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// How long a cached catalog counts as fresh, in milliseconds.
    ///
    /// Set via APPSHELF_CACHE_TTL_MS environment variable.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via APPSHELF_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts for blocking fetches after a transport failure.
    ///
    /// Set via APPSHELF_FETCH_RETRIES environment variable.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// First retry delay in milliseconds; doubles per attempt.
    ///
    /// Set via APPSHELF_RETRY_BACKOFF_MS environment variable.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via APPSHELF_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_document_path() -> String {
    "apps".into()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("./appshelf-cache.sqlite")
}

fn default_cache_ttl_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_user_agent() -> String {
    "appshelf/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            document_path: default_document_path(),
            cache_path: default_cache_path(),
            cache_ttl_ms: default_cache_ttl_ms(),
            timeout_ms: default_timeout_ms(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Cache freshness window.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("APPSHELF_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("APPSHELF_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Database URL, required before connecting to the remote store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the database URL is not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "database_url".into(),
            hint: "Set APPSHELF_DATABASE_URL environment variable".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.document_path, "apps");
        assert_eq!(config.cache_path, PathBuf::from("./appshelf-cache.sqlite"));
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.fetch_retries, 2);
        assert_eq!(config.user_agent, "appshelf/0.1");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
        assert_eq!(config.retry_backoff(), Duration::from_millis(200));
    }

    #[test]
    fn test_require_database_url_missing() {
        let config = AppConfig::default();
        let result = config.require_database_url();
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_require_database_url_present() {
        let config = AppConfig { database_url: Some("https://shelf.example.com".into()), ..Default::default() };
        assert_eq!(config.require_database_url().unwrap(), "https://shelf.example.com");
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string("cache_ttl_ms = 60000\ndocument_path = \"catalog\""));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.cache_ttl_ms, 60_000);
        assert_eq!(config.document_path, "catalog");
        assert_eq!(config.timeout_ms, 20_000);
    }
}
