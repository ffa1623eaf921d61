//! Binary-to-data-URI encoding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::fetch::FetchedImage;
use novel_covers_core::Error;

/// Build a `data:<mime>;base64,<payload>` URI.
pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Encode a fetched image off the async runtime.
///
/// The work runs on tokio's blocking pool; the returned future completes
/// once with either the URI or an `Error::Encode`.
pub async fn encode_data_url(image: FetchedImage) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || to_data_url(&image.bytes, &image.mime))
        .await
        .map_err(|e| Error::Encode(format!("encoding task failed: {e}")))
}
