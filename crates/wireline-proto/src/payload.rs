//! Payload helpers for chat and image frames.
//!
//! Payloads stay opaque at frame-parse time: the tag is decided once when a
//! line is classified, but base64 decoding and field splitting happen lazily
//! at the point of use so that a malformed payload produces a recoverable
//! error instead of an unparseable frame.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::errors::{ProtocolError, Result};

/// Chat payload: optional sender identity plus message text.
///
/// The wire carries either bare text or `sender<sep>text`, where the
/// separator is ` | ` (written by current peers) or the legacy `: ` (still
/// accepted on read). Writers always emit ` | ` so that message text
/// containing `: ` never splits ambiguously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    /// Sender identity (peer IP on hub-relayed messages). `None` for bare
    /// text from legacy peers.
    pub sender: Option<String>,
    /// Message text. Must not contain a newline.
    pub text: String,
}

impl ChatPayload {
    /// Build a payload with an explicit sender.
    pub fn from_sender(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self { sender: Some(sender.into()), text: text.into() }
    }

    /// Parse a chat payload, preferring the ` | ` separator and falling back
    /// to the legacy `: ` form.
    pub fn parse(payload: &str) -> Self {
        if let Some((sender, text)) = payload.split_once(" | ") {
            Self { sender: Some(sender.to_string()), text: text.to_string() }
        } else if let Some((sender, text)) = payload.split_once(": ") {
            Self { sender: Some(sender.to_string()), text: text.to_string() }
        } else {
            Self { sender: None, text: payload.to_string() }
        }
    }

    /// Serialize to the wire form. Always emits ` | ` when a sender is set.
    pub fn to_wire(&self) -> String {
        match &self.sender {
            Some(sender) => format!("{sender} | {}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Image payload: `filename|base64data`, kept as the raw string.
///
/// Splitting and base64 decoding are deferred to [`ImagePayload::decode`] so
/// the caller decides how to surface a bad payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    raw: String,
}

impl ImagePayload {
    /// Wrap a raw `filename|base64` payload as received from the wire.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Encode image bytes into a payload.
    pub fn from_bytes(filename: &str, bytes: &[u8]) -> Self {
        Self { raw: format!("{filename}|{}", STANDARD.encode(bytes)) }
    }

    /// Raw payload string (no tag, no terminator).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Filename field, if the payload has the expected shape.
    pub fn filename(&self) -> Option<&str> {
        self.raw.split_once('|').map(|(name, _)| name)
    }

    /// Split into `(filename, base64)` without decoding the data.
    pub fn split(&self) -> Result<(&str, &str)> {
        self.raw
            .split_once('|')
            .ok_or_else(|| ProtocolError::InvalidImagePayload("missing '|' delimiter".to_string()))
    }

    /// Decode into `(filename, bytes)`, validating shape and base64.
    pub fn decode(&self) -> Result<(String, Vec<u8>)> {
        let (filename, data) = self.split()?;
        let bytes = STANDARD.decode(data)?;
        Ok((filename.to_string(), bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_prefers_pipe_separator() {
        let payload = ChatPayload::parse("10.0.0.1 | still: ambiguous");
        assert_eq!(payload.sender.as_deref(), Some("10.0.0.1"));
        assert_eq!(payload.text, "still: ambiguous");
    }

    #[test]
    fn chat_accepts_legacy_colon_separator() {
        let payload = ChatPayload::parse("10.0.0.1: hello");
        assert_eq!(payload.sender.as_deref(), Some("10.0.0.1"));
        assert_eq!(payload.text, "hello");
    }

    #[test]
    fn chat_without_separator_is_bare_text() {
        let payload = ChatPayload::parse("just text");
        assert_eq!(payload.sender, None);
        assert_eq!(payload.text, "just text");
    }

    #[test]
    fn chat_writes_pipe_form() {
        let payload = ChatPayload::from_sender("10.0.0.1", "a: b");
        assert_eq!(payload.to_wire(), "10.0.0.1 | a: b");
    }

    #[test]
    fn image_round_trip() {
        let bytes = [0u8, 1, 2, 254, 255];
        let payload = ImagePayload::from_bytes("pic.png", &bytes);
        let (name, decoded) = payload.decode().unwrap();
        assert_eq!(name, "pic.png");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn image_empty_data_round_trip() {
        let payload = ImagePayload::from_bytes("empty.png", &[]);
        let (name, decoded) = payload.decode().unwrap();
        assert_eq!(name, "empty.png");
        assert!(decoded.is_empty());
    }

    #[test]
    fn image_missing_delimiter_is_error() {
        let payload = ImagePayload::new("no-delimiter-here");
        assert!(matches!(payload.decode(), Err(ProtocolError::InvalidImagePayload(_))));
    }

    #[test]
    fn image_bad_base64_is_error() {
        let payload = ImagePayload::new("pic.png|not!!base64");
        assert!(matches!(payload.decode(), Err(ProtocolError::Base64(_))));
    }
}
