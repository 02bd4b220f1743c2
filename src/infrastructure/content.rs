//! Content references: file bytes carried inline as `data:<mime>;base64,<payload>` URLs.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

const FALLBACK_MIME: &str = "application/octet-stream";

pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    let mime = if mime.trim().is_empty() { FALLBACK_MIME } else { mime.trim() };
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Splits a content reference back into its MIME type and raw bytes.
pub fn decode_data_url(content_ref: &str) -> Result<(String, Vec<u8>)> {
    let rest = content_ref.strip_prefix("data:").ok_or_else(|| anyhow!("not a data url"))?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| anyhow!("data url has no payload separator"))?;
    match header.strip_suffix(";base64") {
        Some(mime) => {
            let bytes = STANDARD.decode(payload).context("invalid base64 payload")?;
            Ok((mime_or_fallback(mime), bytes))
        }
        None => Ok((mime_or_fallback(header), payload.as_bytes().to_vec())),
    }
}

fn mime_or_fallback(mime: &str) -> String {
    if mime.is_empty() { FALLBACK_MIME.to_string() } else { mime.to_string() }
}
