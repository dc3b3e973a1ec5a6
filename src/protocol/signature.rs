//! Message authentication: HMAC-SHA256 over the raw payload text.
//!
//! Every envelope carries `signature.HMAC = base64(HMAC-SHA256(secret, payload))`
//! where `payload` is the exact byte sequence of the `"payload"` object as it
//! appears on the wire. Verification therefore works on raw text:
//!
//! 1. [`extract_payload_text`] slices the payload object out of the message
//!    by brace counting (never by re-serialising a parsed value, which could
//!    reorder keys or change whitespace).
//! 2. [`verify`] recomputes the signature over that slice and compares the
//!    base64 text byte for byte.
//!
//! Crypto is handled by the `hmac-sha256` crate: pure Rust, no_std,
//! identical on ESP-IDF and host targets.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::warn;

use crate::error::{Result, SdkError};

/// Length of a base64-encoded 32-byte tag.
pub const SIGNATURE_LEN: usize = 44;

/// Compute `base64(HMAC-SHA256(secret, payload_text))`.
pub fn sign(secret: &[u8], payload_text: &str) -> String {
    let tag = hmac_sha256::HMAC::mac(payload_text.as_bytes(), secret);
    STANDARD.encode(tag)
}

/// Recompute the signature over `payload_text` and compare it with `signature`.
///
/// The comparison visits every byte regardless of where the first mismatch is.
pub fn verify(secret: &[u8], payload_text: &str, signature: &str) -> Result<()> {
    let expected = sign(secret, payload_text);
    let (a, b) = (expected.as_bytes(), signature.as_bytes());
    if a.len() != b.len() {
        warn!("RX: signature length mismatch ({} != {})", b.len(), a.len());
        return Err(SdkError::SignatureInvalid);
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    if diff != 0 {
        warn!("RX: signature mismatch");
        return Err(SdkError::SignatureInvalid);
    }
    Ok(())
}

/// Return the exact text of the `"payload"` object inside `full_json`.
///
/// Locates the `"payload"` key, skips whitespace and the colon, then counts
/// braces up to the matching close. Braces inside string literals (including
/// escaped quotes) are ignored. Returns `None` when there is no payload key
/// or the object is unterminated.
pub fn extract_payload_text(full_json: &str) -> Option<&str> {
    const KEY: &str = "\"payload\"";
    let bytes = full_json.as_bytes();

    let mut search_from = 0;
    let start = loop {
        let rel = full_json[search_from..].find(KEY)?;
        let mut i = search_from + rel + KEY.len();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b':' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b'{' {
                break i;
            }
            return None;
        }
        // "payload" appeared as a value, not a key; keep looking.
        search_from = search_from + rel + KEY.len();
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &c) in bytes[start..].iter().enumerate() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&full_json[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────
