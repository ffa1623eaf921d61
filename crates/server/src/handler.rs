//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the cover cache.
use std::sync::Arc;

use crate::tools::covers::{
    CoverGetParams, CoverSaveParams, clear_impl, get_impl, purge_impl, save_impl, stats_impl,
};
use novel_covers_client::CoverCache;

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

/// The main MCP server handler for novel-covers.
#[derive(Clone)]
pub struct CoversServer {
    cache: Arc<CoverCache>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl CoversServer {
    /// Create a new server handler around a shared cache.
    pub fn new(cache: Arc<CoverCache>) -> Self {
        Self { cache, tool_router: Self::tool_router() }
    }

    /// Resolve a cover URL to a cached data URI.
    #[tool(
        description = "Resolve a cover image URL to a base64 data URI, downloading and caching it on a miss. Falls back to the original URL if caching fails."
    )]
    async fn cover_get(&self, params: Parameters<CoverGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, params.0).await
    }

    /// Store an already-encoded cover.
    #[tool(description = "Store an already-encoded cover (data URI) under a URL, replacing any previous entry.")]
    async fn cover_save(&self, params: Parameters<CoverSaveParams>) -> Result<CallToolResult, McpError> {
        save_impl(&self.cache, params.0).await
    }

    /// Remove every cached cover.
    #[tool(description = "Remove every cached cover.")]
    async fn cover_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.cache).await
    }

    /// Report entry count and store identifiers.
    #[tool(description = "Report the number of cached covers and the store identifiers.")]
    async fn cover_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache).await
    }

    /// Delete covers older than the expiry window.
    #[tool(description = "Delete cached covers older than the 7-day expiry window.")]
    async fn cover_purge(&self) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache).await
    }
}

impl ServerHandler for CoversServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "novel-covers".into(),
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
