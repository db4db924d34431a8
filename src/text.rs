//! Byte-transparent conversion between text and bytes.
//!
//! The controller speaks 8-bit ASCII-ish text that is not guaranteed to be
//! valid UTF-8. Each byte maps to the character with the same code point
//! (U+0000 to U+00FF), so any byte sequence survives a round trip.

use crate::error::UnencodableCharacterError;

/// Decode bytes into text, one character per byte.
pub fn to_str(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// Encode text into bytes, one byte per character.
///
/// Fails if any character is above U+00FF.
pub fn to_bytes(text: &str) -> Result<Vec<u8>, UnencodableCharacterError> {
    text.chars()
        .map(|c| u8::try_from(c).map_err(|_| UnencodableCharacterError::new(text, c)))
        .collect()
}
