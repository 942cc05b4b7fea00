//! cache_list tool implementation.
//!
//! Lists partitions with their sizes, optionally with one partition's entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::CacheController;
use shellcache_core::cache::{EntryMeta, PartitionStats};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Partition whose entries should be listed as well.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub partitions: Vec<PartitionStats>,
    pub entries: Option<Vec<EntryMeta>>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(controller: &CacheController, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let storage = controller.storage();
    let partitions = storage.stats().await?;

    let entries = match params.partition {
        Some(name) => Some(storage.open_partition(&name).keys().await?),
        None => None,
    };

    json_result(&CacheListOutput { partitions, entries })
}
