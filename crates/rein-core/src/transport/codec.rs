//! Newline-delimited JSON framing.

use crate::domain::message::Message;

/// Longest preview of a bad line that goes into a log record.
pub const PREVIEW_CHARS: usize = 120;

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// Empty or whitespace-only line.
    Blank,
    Record(Message),
    /// Not a JSON object. Carries a short reason.
    Malformed(String),
}

/// Decode one line (without its trailing newline).
pub fn decode_line(line: &[u8], seq: u64) -> Decoded {
    let line = line.strip_prefix(BOM).unwrap_or(line);
    let text = match std::str::from_utf8(line) {
        Ok(t) => t.trim(),
        Err(e) => return Decoded::Malformed(format!("invalid utf-8: {e}")),
    };
    if text.is_empty() {
        return Decoded::Blank;
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => match Message::from_value(value, seq) {
            Some(msg) => Decoded::Record(msg),
            None => Decoded::Malformed("not a JSON object".to_string()),
        },
        Err(e) => Decoded::Malformed(e.to_string()),
    }
}

/// First [`PREVIEW_CHARS`] characters of a raw line, lossily decoded.
pub fn preview(line: &[u8]) -> String {
    String::from_utf8_lossy(line).chars().take(PREVIEW_CHARS).collect()
}
