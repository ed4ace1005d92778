// ABOUTME: Encodes and decodes a single Entry as one line of JSON.
// ABOUTME: Decoding is pure; a bad line yields a DecodeError and touches nothing else.

use thiserror::Error;
use worklog_core::{Entry, EntryError};

/// A line that could not be turned into an Entry.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("line is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("{0}")]
    Invalid(#[from] EntryError),
}

/// Serialize an entry to a single JSON line without the trailing newline.
/// serde_json never emits raw newlines inside a compact document, and writes
/// non-ASCII text as UTF-8 rather than escaping it.
pub fn encode_line(entry: &Entry) -> Result<String, serde_json::Error> {
    serde_json::to_string(entry)
}

/// Parse one line of text into an entry. Surrounding whitespace is ignored.
/// Well-formed JSON holding an empty description or an out-of-range
/// duration is rejected like any other bad line.
pub fn decode_line(line: &str) -> Result<Entry, DecodeError> {
    let entry: Entry = serde_json::from_str(line.trim())?;
    entry.validate()?;
    Ok(entry)
}

/// Like `decode_line` but starting from raw bytes, which may not be UTF-8.
pub fn decode_bytes(line: &[u8]) -> Result<Entry, DecodeError> {
    decode_line(std::str::from_utf8(line)?)
}
