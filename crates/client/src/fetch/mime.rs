//! Content-type resolution for downloaded covers.
//!
//! Prefers the server's `Content-Type` when it names an image, otherwise
//! sniffs magic bytes.

/// Used when neither the header nor the bytes identify the format.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Detect an image format from its leading bytes.
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    // JPEG: FF D8 FF
    if data.len() >= 3 && data[0..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }

    // PNG: 89 50 4E 47 0D 0A 1A 0A
    if data.len() >= 8 && data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }

    // WebP: RIFF....WEBP
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    // AVIF: ftyp box with avif/avis brand
    if data.len() >= 12 && &data[4..8] == b"ftyp" && (&data[8..12] == b"avif" || &data[8..12] == b"avis") {
        return Some("image/avif");
    }

    // GIF87a / GIF89a
    if data.len() >= 6 && &data[0..3] == b"GIF" {
        return Some("image/gif");
    }

    if data.len() >= 2 && &data[0..2] == b"BM" {
        return Some("image/bmp");
    }

    None
}

/// Pick the MIME type for the data URI.
///
/// Header parameters (`; charset=...`) are dropped. A header that is not an
/// `image/*` type loses to sniffing, since many CDNs serve covers as
/// `application/octet-stream` or `binary/octet-stream`.
pub fn resolve_mime(content_type: Option<&str>, data: &[u8]) -> String {
    let header = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty());

    match header {
        Some(ct) if ct.starts_with("image/") => ct,
        other => sniff_image_mime(data)
            .map(str::to_string)
            .or(other)
            .unwrap_or_else(|| FALLBACK_MIME.to_string()),
    }
}
