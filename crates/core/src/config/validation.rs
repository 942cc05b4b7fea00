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
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_name_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `version` or `cache_prefix` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - `hash_pattern` is not a valid regex
    /// - an entry of `asset_extensions` does not start with `.`
    /// - `api_marker` or `user_agent` is empty
    /// - `timeout_ms` is outside 100ms..=5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_name_token(&self.version) {
            return Err(invalid("version", "must be non-empty without whitespace"));
        }
        if !is_name_token(&self.cache_prefix) {
            return Err(invalid("cache_prefix", "must be non-empty without whitespace"));
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme()))),
            Err(e) => return Err(invalid("origin", e.to_string())),
        }

        if let Err(e) = regex::Regex::new(&self.hash_pattern) {
            return Err(invalid("hash_pattern", e.to_string()));
        }

        if let Some(ext) = self.asset_extensions.iter().find(|ext| !ext.starts_with('.') || ext.len() < 2) {
            return Err(invalid("asset_extensions", format!("'{ext}' must look like '.ext'")));
        }

        if self.api_marker.is_empty() {
            return Err(invalid("api_marker", "must not be empty"));
        }
        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.precache.is_empty() {
            tracing::warn!(version = %self.version, "precache manifest is empty; install will store no shell");
        }

        Ok(())
    }
}
