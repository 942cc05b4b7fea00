//! cache_purge tool implementation.
//!
//! Reclaims storage the way a browser does under quota pressure: oldest
//! entries go first, across every partition.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::CacheController;

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Keep only the newest N entries.
    pub max_entries: usize,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(controller: &CacheController, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = controller.storage().evict_oldest(params.max_entries).await?;
    tracing::info!(deleted, max_entries = params.max_entries, "reclaimed cache storage");

    json_result(&CachePurgeOutput { deleted })
}
