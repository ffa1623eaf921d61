//! cover_save tool implementation.
//!
//! Stores an already-encoded cover without downloading anything.

use novel_covers_client::CoverCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cover_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverSaveParams {
    /// Cache key, normally the cover's source URL.
    pub url: String,

    /// Self-contained encoded image, e.g. `data:image/jpeg;base64,...`.
    pub data: String,
}

/// Output from the cover_save tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverSaveOutput {
    pub url: String,
}

/// Implementation of the cover_save tool.
///
/// Store failures are logged by the cache and not reported here.
pub async fn save_impl(cache: &CoverCache, params: CoverSaveParams) -> Result<CallToolResult, McpError> {
    if params.url.is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".to_string()).into());
    }

    cache.save_base64(&params.url, &params.data).await;

    json_result(&CoverSaveOutput { url: params.url })
}
