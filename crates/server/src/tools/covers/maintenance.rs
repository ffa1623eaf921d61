//! cover_clear, cover_stats and cover_purge tool implementations.
//!
//! Unlike cover_get, these surface store failures to the caller.

use novel_covers_client::CoverCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cover_clear tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverClearOutput {
    pub cleared: bool,
}

/// Output from the cover_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverPurgeOutput {
    /// Number of expired entries deleted.
    pub deleted: u64,
}

/// Implementation of the cover_clear tool.
pub async fn clear_impl(cache: &CoverCache) -> Result<CallToolResult, McpError> {
    cache.clear_all().await?;
    json_result(&CoverClearOutput { cleared: true })
}

/// Implementation of the cover_stats tool.
pub async fn stats_impl(cache: &CoverCache) -> Result<CallToolResult, McpError> {
    let stats = cache.get_stats().await?;
    json_result(&stats)
}

/// Implementation of the cover_purge tool.
pub async fn purge_impl(cache: &CoverCache) -> Result<CallToolResult, McpError> {
    let deleted = cache.purge_expired().await?;
    json_result(&CoverPurgeOutput { deleted })
}
