//! Server error types.

use std::fmt;

use crate::store::StoreError;

/// Errors that can occur in the relay server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unusable directories).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Transport/network error (accept failure, I/O error, etc.).
    ///
    /// Fatal for the affected connection only; the server keeps serving
    /// other peers.
    Transport(String),

    /// Frame encoding error.
    ///
    /// Failed to serialize an outbound frame. Indicates a bug or an
    /// unencodable catalog listing; the frame is dropped.
    Protocol(String),

    /// Image store error (missing catalog entry, disk failure).
    ///
    /// Recovered locally: surfaced to the requesting peer as an
    /// `IMAGE_ERROR` frame, never fatal to the connection.
    Store(StoreError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<wireline_proto::ProtocolError> for ServerError {
    fn from(err: wireline_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
