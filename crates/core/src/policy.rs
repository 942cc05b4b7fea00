//! Request classification.
//!
//! Decides, per intercepted request, which strategy handles it. Rules are
//! evaluated in order and the first match wins:
//!
//! 1. Non-GET requests pass through.
//! 2. URLs containing the API marker pass through.
//! 3. Non-HTTP(S) schemes and browser-extension origins pass through.
//! 4. Immutable assets (known extension, under the assets segment or with a
//!    content-hashed filename) are served cache-first.
//! 5. Requests accepting `text/html` are served stale-while-revalidate.
//! 6. Everything else is network-first.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::request::CacheRequest;

/// Why a request was left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PassReason {
    Method,
    Api,
    Scheme,
    /// The controller has not finished activating. Never produced by
    /// [`RequestPolicy::classify`].
    Inactive,
}

/// The strategy chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Route {
    Passthrough(PassReason),
    CacheFirst,
    StaleWhileRevalidate,
    NetworkFirst,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Passthrough(PassReason::Method) => f.write_str("passthrough(method)"),
            Route::Passthrough(PassReason::Api) => f.write_str("passthrough(api)"),
            Route::Passthrough(PassReason::Scheme) => f.write_str("passthrough(scheme)"),
            Route::Passthrough(PassReason::Inactive) => f.write_str("passthrough(inactive)"),
            Route::CacheFirst => f.write_str("cache-first"),
            Route::StaleWhileRevalidate => f.write_str("stale-while-revalidate"),
            Route::NetworkFirst => f.write_str("network-first"),
        }
    }
}

/// Error building a policy from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid hash pattern '{pattern}': {source}")]
    HashPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct RequestPolicy {
    api_marker: String,
    asset_extensions: Vec<String>,
    assets_segment: String,
    hash_pattern: Regex,
}

impl RequestPolicy {
    pub fn from_config(config: &AppConfig) -> Result<Self, PolicyError> {
        let hash_pattern = Regex::new(&config.hash_pattern)
            .map_err(|source| PolicyError::HashPattern { pattern: config.hash_pattern.clone(), source })?;

        Ok(Self {
            api_marker: config.api_marker.clone(),
            asset_extensions: config.asset_extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            assets_segment: config.assets_segment.clone(),
            hash_pattern,
        })
    }

    pub fn classify(&self, request: &CacheRequest) -> Route {
        if request.method != "GET" {
            return Route::Passthrough(PassReason::Method);
        }

        if request.url.as_str().contains(&self.api_marker) {
            return Route::Passthrough(PassReason::Api);
        }

        // Extension origins (chrome-extension:, moz-extension:) land here too.
        if !matches!(request.url.scheme(), "http" | "https") {
            return Route::Passthrough(PassReason::Scheme);
        }

        if self.is_static_asset(request.url.path()) {
            return Route::CacheFirst;
        }

        if request.accept().is_some_and(|accept| accept.contains("text/html")) {
            return Route::StaleWhileRevalidate;
        }

        Route::NetworkFirst
    }

    /// Immutable assets need a known extension plus evidence the name changes
    /// with the content: either the bundler's assets directory or a hash suffix.
    pub fn is_static_asset(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        if !self.asset_extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
            return false;
        }

        (!self.assets_segment.is_empty() && path.contains(&self.assets_segment)) || self.hash_pattern.is_match(path)
    }
}
