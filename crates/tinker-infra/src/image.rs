//! Normalization of user-supplied image payloads.
//!
//! Clients send either a `data:image/...;base64,` URL, an `http(s)` URL, or
//! bare base64. Everything is normalized to a form the provider accepts as an
//! `image_url` part: URLs pass through, bare base64 is sniffed and wrapped
//! into a data URL.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use tinker_types::error::TurnError;

/// Validate `raw` and return the image reference to store.
pub fn normalize_image_ref(raw: &str, max_bytes: usize) -> Result<String, TurnError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TurnError::Validation("image must not be empty".to_string()));
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Ok(raw.to_string());
    }

    if let Some(rest) = raw.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| TurnError::Validation("malformed image data URL".to_string()))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| TurnError::Validation("image data URL must be base64".to_string()))?;
        if !mime.starts_with("image/") {
            return Err(TurnError::Validation(format!(
                "unsupported image type: {mime}"
            )));
        }
        decode_checked(payload, max_bytes)?;
        return Ok(raw.to_string());
    }

    let bytes = decode_checked(raw, max_bytes)?;
    let mime = sniff_mime(&bytes)
        .ok_or_else(|| TurnError::Validation("unrecognized image format".to_string()))?;
    Ok(format!("data:{mime};base64,{raw}"))
}

fn decode_checked(payload: &str, max_bytes: usize) -> Result<Vec<u8>, TurnError> {
    // Reject oversized payloads before decoding them.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(too_large(max_bytes));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| TurnError::Validation(format!("image is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(TurnError::Validation("image must not be empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }
    Ok(bytes)
}

fn too_large(max_bytes: usize) -> TurnError {
    TurnError::Validation(format!("image exceeds {max_bytes} bytes"))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
