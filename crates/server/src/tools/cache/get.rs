//! cache_get tool implementation.
//!
//! Retrieves a stored response from whichever partition holds it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::CacheController;
use shellcache_core::Error;

use crate::error::HostError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method the entry was stored under (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub url: String,
    pub partition: String,
    pub stored_at: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(controller: &CacheController, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(HostError::InvalidInput("url cannot be empty".into()).into());
    }

    let request = controller.request(params.method.as_deref().unwrap_or("GET"), &params.url)?;
    let hit = controller
        .storage()
        .match_any(&controller.key_for(&request))
        .await?
        .ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    json_result(&CacheGetOutput {
        url: request.url.to_string(),
        partition: hit.partition,
        stored_at: hit.stored_at,
        status: hit.response.status,
        body: String::from_utf8_lossy(&hit.response.body).into_owned(),
        headers: hit.response.headers,
    })
}
