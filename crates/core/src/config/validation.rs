//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_ttl_ms` is under 1 second or over 24 hours
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `fetch_retries` exceeds 10
    /// - `document_path` or `user_agent` is empty
    /// - `database_url` is set but not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_ms < 1_000 {
            return Err(ConfigError::Invalid { field: "cache_ttl_ms".into(), reason: "must be at least 1000ms".into() });
        }
        if self.cache_ttl_ms > 86_400_000 {
            return Err(ConfigError::Invalid { field: "cache_ttl_ms".into(), reason: "must not exceed 24 hours".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.fetch_retries > 10 {
            return Err(ConfigError::Invalid { field: "fetch_retries".into(), reason: "must not exceed 10".into() });
        }

        if self.document_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid { field: "document_path".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if let Some(url) = &self.database_url
            && !(url.starts_with("https://") || url.starts_with("http://"))
        {
            return Err(ConfigError::Invalid {
                field: "database_url".into(),
                reason: "must be an http(s) URL".into(),
            });
        }

        if self.fetch_retries > 0 && self.retry_backoff_ms == 0 {
            tracing::warn!(
                fetch_retries = self.fetch_retries,
                "retry_backoff_ms is 0; failed fetches will be retried immediately"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ttl_too_small() {
        let config = AppConfig { cache_ttl_ms: 999, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_ms"));
    }

    #[test]
    fn test_validate_ttl_exceeds_limit() {
        let config = AppConfig { cache_ttl_ms: 86_400_001, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_ms"));
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_too_many_retries() {
        let config = AppConfig { fetch_retries: 11, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "fetch_retries"));
    }

    #[test]
    fn test_validate_empty_document_path() {
        let config = AppConfig { document_path: "/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "document_path"));
    }

    #[test]
    fn test_validate_database_url_scheme() {
        let config = AppConfig { database_url: Some("ftp://shelf.example.com".into()), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "database_url"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig {
            cache_ttl_ms: 1_000,
            timeout_ms: 100,
            fetch_retries: 0,
            database_url: Some("http://localhost:9000".into()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
