//! SSE event framing for the relay ↔ caller stream.
//!
//! Wire format: each forwarded fragment is one event `data: <json-string>\n\n`,
//! where `<json-string>` is the JSON-stringified fragment text. The fragment
//! is double-encoded on the wire (JSON text carried inside a JSON string);
//! [`decode_event`] reverses both layers in a single typed step.

use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// Prefix of every data event frame.
pub const DATA_PREFIX: &str = "data: ";

/// Delimiter terminating one event frame on the caller-facing stream.
pub const EVENT_DELIMITER: &[u8] = b"\n\n";

/// Delimiter terminating one fragment line on the backend stream.
pub const LINE_DELIMITER: &[u8] = b"\n";

/// Encode one raw fragment text as an SSE data event.
///
/// The fragment text is JSON-stringified so the event payload is a single
/// line regardless of the fragment's own content.
pub fn encode_event(fragment_text: &str) -> String {
    let quoted = serde_json::Value::String(fragment_text.to_owned()).to_string();
    format!("{DATA_PREFIX}{quoted}\n\n")
}

/// Decode one complete event payload into a typed [`Fragment`].
///
/// Strips the `data: ` prefix, un-stringifies the outer JSON string, and
/// parses the inner fragment JSON. Any layer failing yields an error the
/// caller is expected to skip over, not abort on.
pub fn decode_event(payload: &str) -> Result<Fragment> {
    let trimmed = payload.trim();
    let body = trimmed.strip_prefix(DATA_PREFIX).ok_or_else(|| {
        Error::FrameDecode(format!("missing event prefix in {trimmed:?}"))
    })?;
    let fragment_text: String = serde_json::from_str(body)?;
    Fragment::parse(&fragment_text)
}

/// Accumulates transport reads and yields complete delimiter-terminated units.
///
/// Transport chunks may split one unit across reads or pack several units
/// into one read; the buffer re-frames them so each unit is seen exactly
/// once, in order. Yielded units do not include the delimiter.
#[derive(Debug)]
pub struct ChunkBuffer {
    buf: Vec<u8>,
    delimiter: &'static [u8],
}

impl ChunkBuffer {
    /// Buffer splitting on single newlines (backend fragment lines).
    pub const fn lines() -> Self {
        Self {
            buf: Vec::new(),
            delimiter: LINE_DELIMITER,
        }
    }

    /// Buffer splitting on blank lines (caller-facing event frames).
    pub const fn events() -> Self {
        Self {
            buf: Vec::new(),
            delimiter: EVENT_DELIMITER,
        }
    }

    /// Append one transport read.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete unit, if one is buffered.
    ///
    /// Returns `None` when no delimiter-terminated unit is available yet;
    /// partial bytes stay buffered until more arrive. A unit that is not
    /// valid UTF-8 yields an error, and the bytes are consumed so the
    /// following unit is still reachable.
    pub fn next_unit(&mut self) -> Option<Result<String>> {
        let pos = find_delimiter(&self.buf, self.delimiter)?;
        let unit = self.buf[..pos].to_vec();
        self.buf.drain(..pos + self.delimiter.len());
        Some(
            String::from_utf8(unit)
                .map_err(|e| Error::FrameDecode(format!("invalid UTF-8 in unit: {e}"))),
        )
    }

    /// Drain the remainder after end-of-stream.
    ///
    /// The backend's final fragment carries no trailing delimiter, so the
    /// last unit surfaces here. Returns `None` when nothing is buffered.
    pub fn finish(&mut self) -> Option<Result<String>> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(
            String::from_utf8(rest)
                .map_err(|e| Error::FrameDecode(format!("invalid UTF-8 in unit: {e}"))),
        )
    }
}

fn find_delimiter(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
