//! Byte-dump decoder
//!
//! The shell cannot print TIS-620 text without mangling it, but it prints
//! the database's `DUMP()` diagnostic reliably:
//!
//! ```text
//! Typ=1 Len=3: 161,210,195
//! ```
//!
//! Decoding reverses that listing back into text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::tis620;

/// Returned when a dump cannot be decoded
pub const CONVERSION_FAILED: &str = "[conversion failed]";

static DUMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Len=(\d+):\s*([\d,\s]*)").expect("dump pattern is a valid constant regex")
});

/// Result of decoding one dump field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Text recovered from the byte listing
    Text(String),
    /// No `Len=<n>:` marker; the input is passed through
    Passthrough(String),
    /// The listing was malformed; carries [`CONVERSION_FAILED`]
    Failed,
}

impl Decoded {
    pub fn into_string(self) -> String {
        match self {
            Decoded::Text(text) | Decoded::Passthrough(text) => text,
            Decoded::Failed => CONVERSION_FAILED.to_string(),
        }
    }
}

/// Decode a dump field, never failing
pub fn decode(dump_text: &str) -> String {
    decode_with_status(dump_text).into_string()
}

/// Decode a dump field and report how it went
pub fn decode_with_status(dump_text: &str) -> Decoded {
    let Some(caps) = DUMP_PATTERN.captures(dump_text) else {
        return Decoded::Passthrough(dump_text.to_string());
    };

    let declared_len = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());
    let listing = caps.get(2).map_or("", |m| m.as_str());

    let mut text = String::with_capacity(listing.len() / 3);
    let mut count = 0usize;
    for token in listing.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let Ok(byte) = token.parse::<u32>() else {
            debug!(token, "Byte dump token is not an unsigned integer");
            return Decoded::Failed;
        };
        text.push(tis620::decode_byte(byte));
        count += 1;
    }

    if declared_len.is_some_and(|len| len != count) {
        debug!(
            declared = ?declared_len,
            actual = count,
            "Byte dump length does not match its listing"
        );
    }

    Decoded::Text(text)
}
