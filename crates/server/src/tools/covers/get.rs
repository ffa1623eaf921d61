//! cover_get tool implementation.
//!
//! Resolves a cover URL to a data URI, downloading and caching on a miss.

use novel_covers_client::CoverCache;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cover_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverGetParams {
    /// Source URL of the cover image. Missing or empty yields a null cover.
    #[serde(default)]
    pub url: Option<String>,
}

/// Output from the cover_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoverGetOutput {
    /// The requested URL.
    pub url: Option<String>,
    /// A `data:` URI, or the source URL when caching failed.
    pub cover: Option<String>,
    /// True when `cover` is the source URL rather than cached data.
    pub fallback: bool,
}

/// Implementation of the cover_get tool.
///
/// Never fails because of the cache; a broken store or download shows up as
/// `fallback: true`.
pub async fn get_impl(cache: &CoverCache, params: CoverGetParams) -> Result<CallToolResult, McpError> {
    let resolved = cache.resolve_cover(params.url.as_deref()).await;
    let fallback = resolved.as_ref().is_some_and(|r| r.fallback);
    let cover = resolved.map(|r| r.cover);

    json_result(&CoverGetOutput { url: params.url, cover, fallback })
}
