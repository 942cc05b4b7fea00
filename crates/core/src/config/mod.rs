//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
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
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List-valued fields accept array syntax in the environment,
/// e.g. `SHELLCACHE_PRECACHE='["/", "/app"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the application shell is served from.
    ///
    /// Relative request URLs and precache entries resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix shared by every partition name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version token embedded in partition names.
    ///
    /// Bumping it is the only way to invalidate previously cached partitions.
    #[serde(default = "default_version")]
    pub version: String,

    /// Application shell URLs stored in the static partition at install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// File extensions treated as immutable assets.
    #[serde(default = "default_asset_extensions")]
    pub asset_extensions: Vec<String>,

    /// Path segment under which bundler output lives.
    #[serde(default = "default_assets_segment")]
    pub assets_segment: String,

    /// Regex matched against the request path to detect content-hashed filenames.
    #[serde(default = "default_hash_pattern")]
    pub hash_pattern: String,

    /// URL substring marking API requests, which are never cached.
    #[serde(default = "default_api_marker")]
    pub api_marker: String,

    /// Request headers folded into the cache key.
    #[serde(default)]
    pub vary_headers: Vec<String>,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_cache_prefix() -> String {
    "metabolic-reset".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/app",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
        "/icons/apple-touch-icon.png",
        "/favicon.ico",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_asset_extensions() -> Vec<String> {
    [".js", ".css", ".woff2", ".woff", ".ttf", ".png", ".jpg", ".jpeg", ".webp", ".svg", ".ico"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_assets_segment() -> String {
    "/assets/".into()
}

fn default_hash_pattern() -> String {
    r"-[0-9a-f]{8}\.".into()
}

fn default_api_marker() -> String {
    "/api/".into()
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            precache: default_precache(),
            asset_extensions: default_asset_extensions(),
            assets_segment: default_assets_segment(),
            hash_pattern: default_hash_pattern(),
            api_marker: default_api_marker(),
            vary_headers: Vec::new(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the long-lived partition holding hashed assets and the shell.
    pub fn static_partition(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the revalidated partition holding pages and other responses.
    pub fn dynamic_partition(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.version)
    }

    /// Names of every partition belonging to the current version.
    pub fn current_partitions(&self) -> [String; 2] {
        [self.static_partition(), self.dynamic_partition()]
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

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:3000");
        assert_eq!(config.db_path, PathBuf::from("./shellcache.sqlite"));
        assert_eq!(config.version, "v1");
        assert_eq!(config.precache[0], "/");
        assert_eq!(config.precache[1], "/app");
        assert_eq!(config.asset_extensions.len(), 11);
        assert_eq!(config.api_marker, "/api/");
        assert!(config.vary_headers.is_empty());
    }

    #[test]
    fn test_partition_names_embed_version() {
        let config = AppConfig { version: "v7".into(), ..Default::default() };
        assert_eq!(config.static_partition(), "metabolic-reset-static-v7");
        assert_eq!(config.dynamic_partition(), "metabolic-reset-dynamic-v7");
        assert_eq!(config.current_partitions(), [config.static_partition(), config.dynamic_partition()]);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shellcache.toml",
                r#"
                version = "v2"
                precache = ["/", "/offline"]
                "#,
            )?;
            jail.set_env("SHELLCACHE_CONFIG_FILE", "shellcache.toml");
            jail.set_env("SHELLCACHE_VERSION", "v3");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.version, "v3");
            assert_eq!(config.precache, vec!["/".to_string(), "/offline".to_string()]);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_pattern() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SHELLCACHE_HASH_PATTERN", "-[0-9a-f");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "hash_pattern"));
            Ok(())
        });
    }
}
