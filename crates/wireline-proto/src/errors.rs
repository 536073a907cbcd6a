//! Protocol error types.

use thiserror::Error;

/// Errors produced while decoding or encoding frame payloads.
///
/// These are recoverable per-frame errors: a malformed payload never tears
/// down the connection it arrived on. The relay converts them into
/// `IMAGE_ERROR` replies or log lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Image payload did not match the `filename|base64` shape.
    #[error("invalid image payload: {0}")]
    InvalidImagePayload(String),

    /// Image data was not valid base64.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Catalog list could not be JSON-encoded or decoded.
    #[error("catalog list JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ProtocolError>;
