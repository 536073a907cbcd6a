//! Decoded events delivered to the client's consumer.

use std::path::PathBuf;

/// Events the client surfaces to its consumer (GUI, detection pipeline,
/// tests).
///
/// These are the decoded counterparts of hub-to-peer frames; the consumer
/// never sees wire lines. Self-identification of echoed chat is left to the
/// consumer, which knows its own local address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Relayed chat text, with the sender identity when the hub supplied
    /// one.
    Chat {
        /// Sender identity (peer IP), `None` for bare hub text.
        sender: Option<String>,
        /// Message text.
        text: String,
    },

    /// Another peer uploaded an image to the hub.
    ImageNotice {
        /// Uploader's address.
        sender: String,
        /// Stored filename under the hub's inbound directory.
        filename: String,
    },

    /// A delivered image was decoded and saved to the download directory.
    ImageSaved {
        /// Filename as delivered by the hub.
        filename: String,
        /// Path the image was saved under.
        path: PathBuf,
    },

    /// Catalog listing from the hub.
    Catalog(Vec<String>),

    /// Error text from the hub (or a local decode/save failure).
    Error(String),

    /// The connection ended; no further events follow.
    Disconnected,
}
