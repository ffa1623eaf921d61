//! HTTP download of cover images.
//!
//! ### Request
//! - Plain unauthenticated GET of the URL as given (http/https only)
//! - Image-leaning `Accept` header, redirects capped (default: 5)
//!
//! ### Limits
//! - Max body bytes: 10MB (configurable), checked against `Content-Length`
//!   first and then while the body streams in, so an oversized body is
//!   abandoned without being buffered in full
//! - Non-2xx responses are errors
//!
//! A single attempt is made; there is no retry.

pub mod mime;
pub mod url;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use self::mime::{resolve_mime, sniff_image_mime};
pub use self::url::{UrlError, parse_cover_url};

use novel_covers_core::{AppConfig, Error};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "novel-covers/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "novel-covers/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// A downloaded image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// MIME type to embed in the data URI
    pub mime: String,
    /// Raw image bytes
    pub bytes: Bytes,
}

impl FetchedImage {
    pub fn new(mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { mime: mime.into(), bytes: bytes.into() }
    }
}

/// Source of cover bytes.
///
/// The cache only depends on this trait, so downloads can be swapped out
/// without touching lookup logic.
#[async_trait]
pub trait CoverFetcher: Send + Sync {
    /// Download the resource at `url`.
    async fn fetch(&self, url: &str) -> Result<FetchedImage, Error>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn check_size(&self, len: usize) -> Result<(), Error> {
        check_size(len, self.config.max_bytes)
    }
}

fn check_size(len: usize, max: usize) -> Result<(), Error> {
    if len > max {
        return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, max)));
    }
    Ok(())
}

/// Accumulates body chunks up to a byte cap.
struct BodyLimit {
    max: usize,
    buf: BytesMut,
}

impl BodyLimit {
    fn new(max: usize, size_hint: Option<u64>) -> Self {
        let capacity = size_hint.map(|n| n as usize).unwrap_or(0).min(max);
        Self { max, buf: BytesMut::with_capacity(capacity) }
    }

    /// Append a chunk, failing as soon as the running total passes the cap.
    fn push(&mut self, chunk: &[u8]) -> Result<(), Error> {
        check_size(self.buf.len().saturating_add(chunk.len()), self.max)?;
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(err.to_string())
    } else {
        Error::HttpError(format!("network error: {}", err))
    }
}

fn check_status(status: StatusCode) -> Result<(), Error> {
    if status.is_success() { Ok(()) } else { Err(Error::HttpError(format!("status {}", status.as_u16()))) }
}

#[async_trait]
impl CoverFetcher for HttpFetcher {
    async fn fetch(&self, url_str: &str) -> Result<FetchedImage, Error> {
        let start = Instant::now();
        let url = parse_cover_url(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "image/avif,image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(map_send_error)?;

        check_status(response.status())?;

        let declared = response.content_length();
        if let Some(len) = declared {
            self.check_size(usize::try_from(len).unwrap_or(usize::MAX))?;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut body = BodyLimit::new(self.config.max_bytes, declared);
        while let Some(chunk) = response.chunk().await.map_err(map_send_error)? {
            body.push(&chunk)?;
        }
        let bytes = body.finish();

        let mime = resolve_mime(content_type.as_deref(), &bytes);

        tracing::debug!(
            url = %url,
            mime = %mime,
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched cover"
        );

        Ok(FetchedImage { mime, bytes })
    }
}
