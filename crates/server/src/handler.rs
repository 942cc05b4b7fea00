//! MCP server handler implementation.
//!
//! The handler plays the host runtime for the cache controller: it delivers
//! install, activate and fetch events, and exposes cache inspection tools.
use std::sync::Arc;

use crate::tools::{
    cache::{CacheGetParams, CacheListParams, CachePurgeParams, get_impl, list_impl, purge_impl},
    lifecycle::{activate_impl, install_impl, status_impl},
    sw_fetch::{SwFetchParams, fetch_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::CacheController;

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    controller: Arc<CacheController>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler around a controller.
    pub fn new(controller: Arc<CacheController>) -> Self {
        Self { controller, tool_router: Self::tool_router() }
    }

    #[tool(description = "Run the install event: precache the app shell atomically, then activate (skip waiting).")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.controller).await
    }

    #[tool(description = "Run the activate event: delete partitions of other versions and claim clients.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.controller).await
    }

    #[tool(description = "Report lifecycle state, version and partition names.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.controller).await
    }

    /// Deliver a fetch event.
    ///
    /// The controller picks cache-first, stale-while-revalidate, network-first
    /// or passthrough and reports which one answered.
    #[tool(description = "Fetch a URL through the cache controller. Returns the response plus route and source.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.controller, params.0).await
    }

    #[tool(description = "List cache partitions with entry counts and sizes; optionally list one partition's entries.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.controller, params.0).await
    }

    #[tool(description = "Get a stored response for a URL from any partition.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.controller, params.0).await
    }

    #[tool(description = "Reclaim storage by evicting the oldest entries until at most max_entries remain.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.controller, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{controller, shell};

    #[tokio::test]
    async fn test_tool_router_lists_all_tools() {
        let server = ShellCacheServer::new(Arc::new(controller(shell()).await));
        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_get", "cache_list", "cache_purge", "sw_activate", "sw_fetch", "sw_install", "sw_status"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = ShellCacheServer::new(Arc::new(controller(shell()).await));
        assert_eq!(server.get_info().server_info.name, "shellcache");
    }
}
