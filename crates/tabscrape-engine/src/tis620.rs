//! TIS-620 single-byte Thai encoding
//!
//! The defined high bytes map onto the Unicode Thai block at a fixed offset
//! (byte `0xA1` is U+0E01). Bytes 219–223, 238, 239 and 250–255 are not
//! part of the table. The table is a pure function, so it needs no
//! initialisation and is safe to read from any task.

use std::borrow::Cow;

/// Character substituted for bytes with no mapping
pub const PLACEHOLDER: char = '?';

const THAI_BLOCK_OFFSET: u32 = 0x0E00 - 0xA0;

/// Look up the Thai character for a high byte
pub const fn lookup(byte: u8) -> Option<char> {
    match byte {
        161..=218 | 224..=237 | 240..=249 => char::from_u32(byte as u32 + THAI_BLOCK_OFFSET),
        _ => None,
    }
}

/// Decode one byte: printable ASCII, then the Thai table, then the placeholder
pub fn decode_byte(byte: u32) -> char {
    match byte {
        32..=126 => byte as u8 as char,
        161..=255 => lookup(byte as u8).unwrap_or(PLACEHOLDER),
        _ => PLACEHOLDER,
    }
}

/// Inverse of [`lookup`]
pub fn encode_char(c: char) -> Option<u8> {
    let code = c as u32;
    if !(0x0E01..=0x0E59).contains(&code) {
        return None;
    }
    let byte = (code - THAI_BLOCK_OFFSET) as u8;
    lookup(byte).map(|_| byte)
}

/// Encode text as TIS-620. ASCII passes through; characters outside the
/// table become `?`.
pub fn encode_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if c.is_ascii() {
                c as u8
            } else {
                encode_char(c).unwrap_or(PLACEHOLDER as u8)
            }
        })
        .collect()
}

/// Read bytes one per character: ASCII (including control characters
/// such as newlines) as is, high bytes through the Thai table.
pub fn decode_single_byte(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii() {
                b as char
            } else {
                lookup(b).unwrap_or(PLACEHOLDER)
            }
        })
        .collect()
}

/// Reinterpret raw shell output as text.
///
/// Valid UTF-8 is taken as is, anything else goes through
/// [`decode_single_byte`]. A TIS-620 pair such as `0xC3 0xA1` (`รก`) is
/// also valid UTF-8 and comes back as `á`; callers that know the output
/// is single-byte should use [`decode_single_byte`] directly.
pub fn decode_transcript(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(decode_single_byte(bytes)),
    }
}
