//! Base64 helpers for push subscription keys.

use base64::engine::general_purpose::{GeneralPurpose, PAD, STANDARD as BASE64};
use base64::{Engine, alphabet};

use crate::error::{Error, Result};

/// Standard alphabet decoder that, like browsers, ignores non-zero bits left
/// over in the final symbol.
const LENIENT: GeneralPurpose =
    GeneralPurpose::new(&alphabet::STANDARD, PAD.with_decode_allow_trailing_bits(true));

/// Decodes a URL-safe base64 string (as served for VAPID keys) into raw bytes.
///
/// Surrounding whitespace is ignored, `-`/`_` are mapped back to `+`/`/`, and
/// missing `=` padding is restored before decoding.
///
/// # Errors
///
/// Returns [`Error::InvalidVapidKey`] if the input is not valid base64.
pub fn url_base64_to_bytes(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let padding = (4 - trimmed.len() % 4) % 4;

    let mut normalized: String = trimmed
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    normalized.push_str(&"=".repeat(padding));

    LENIENT.decode(normalized.as_bytes()).map_err(|e| {
        log::error!("Failed to decode VAPID key {trimmed:?}: {e}");
        Error::InvalidVapidKey(e.to_string())
    })
}

/// Encodes an optional key buffer as standard base64.
///
/// An absent buffer encodes to the empty string.
#[must_use]
pub fn bytes_to_base64(buffer: Option<&[u8]>) -> String {
    buffer.map(|bytes| BASE64.encode(bytes)).unwrap_or_default()
}
