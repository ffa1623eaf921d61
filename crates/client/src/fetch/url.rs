//! Cover URL validation.
//!
//! The cache key is the URL exactly as the caller passed it, so this module
//! only checks that it can be fetched. It never rewrites it.

/// Error type for cover URL validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Parse a cover URL for fetching.
///
/// Rules:
/// 1. Surrounding whitespace is ignored for parsing
/// 2. Scheme must be `http` or `https`
/// 3. A host must be present
pub fn parse_cover_url(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(trimmed.to_string()));
    }

    Ok(parsed)
}
