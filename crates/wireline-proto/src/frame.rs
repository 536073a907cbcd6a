//! Frame type: one tagged message unit per wire line.
//!
//! Wire shape is `TAG:payload\n` (the keepalive probe is a bare `ping\n`).
//! The tag is decided once at parse time and dispatched by exhaustive
//! matching; a line with no recognized tag becomes [`Frame::Plain`] so that
//! noisy or legacy peers never kill a connection.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    errors::Result,
    payload::{ChatPayload, ImagePayload},
};

/// Tag prefixes (including the trailing colon) the codec recognizes as the
/// start of a known frame. Used by the receive buffer to decide what may be
/// discarded when the no-terminator cap is hit: bytes belonging to a partial
/// known frame are never dropped.
pub const KNOWN_TAG_PREFIXES: &[&[u8]] = &[
    b"MESSAGE:",
    b"CLIENT:",
    b"IMAGE:",
    b"SERVER_IMAGE:",
    b"IMAGE_RECEIVED:",
    b"IMAGE_LIST:",
    b"IMAGE_ERROR:",
    b"REQUEST_LIST",
    b"REQUEST_IMAGE:",
];

/// One complete application message.
///
/// Each variant corresponds to a wire tag; payload decoding that can fail
/// (base64, JSON) is deferred to the payload types so a bad payload surfaces
/// as a recoverable error at the point of use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `MESSAGE:` — hub-to-peers chat broadcast, payload optionally
    /// `sender | text`.
    Message(ChatPayload),

    /// `CLIENT:` — peer-to-hub chat text.
    Client(String),

    /// `IMAGE:` — image upload, payload `filename|base64`.
    Image(ImagePayload),

    /// `SERVER_IMAGE:` — image delivery from the hub catalog, payload
    /// `filename|base64`.
    ServerImage(ImagePayload),

    /// `IMAGE_RECEIVED:` — upload notification, payload
    /// `senderAddress|filename`.
    ImageReceived {
        /// Address of the peer that uploaded the image.
        sender: String,
        /// Stored filename under the hub's inbound directory.
        filename: String,
    },

    /// `IMAGE_LIST:` — catalog listing, payload is a JSON array of
    /// filenames.
    ImageList(Vec<String>),

    /// `IMAGE_ERROR:` — human-readable error text.
    ImageError(String),

    /// `REQUEST_LIST` — ask the hub for its catalog listing. No payload.
    RequestList,

    /// `REQUEST_IMAGE:` — ask the hub for one catalog image by filename.
    RequestImage(String),

    /// Bare `ping` line — liveness probe, discarded by readers.
    Ping,

    /// Line with no recognized tag. Routed nowhere; kept for forward
    /// compatibility instead of erroring.
    Plain(String),
}

impl Frame {
    /// Classify one wire line (terminator already stripped).
    ///
    /// A trailing carriage return is tolerated. Never fails: unrecognized
    /// tags and payloads that don't parse (e.g. a malformed `IMAGE_LIST`
    /// JSON array) degrade to [`Frame::Plain`].
    pub fn parse(line: &str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim() == "ping" {
            return Self::Ping;
        }
        if line == "REQUEST_LIST" {
            return Self::RequestList;
        }

        let Some((tag, payload)) = line.split_once(':') else {
            return Self::Plain(line.to_string());
        };

        match tag {
            "MESSAGE" => Self::Message(ChatPayload::parse(payload)),
            "CLIENT" => Self::Client(payload.to_string()),
            "IMAGE" => Self::Image(ImagePayload::new(payload)),
            "SERVER_IMAGE" => Self::ServerImage(ImagePayload::new(payload)),
            "IMAGE_RECEIVED" => match payload.split_once('|') {
                Some((sender, filename)) => Self::ImageReceived {
                    sender: sender.to_string(),
                    filename: filename.to_string(),
                },
                None => Self::Plain(line.to_string()),
            },
            "IMAGE_LIST" => match serde_json::from_str::<Vec<String>>(payload) {
                Ok(names) => Self::ImageList(names),
                Err(_) => Self::Plain(line.to_string()),
            },
            "IMAGE_ERROR" => Self::ImageError(payload.to_string()),
            "REQUEST_LIST" => Self::RequestList,
            "REQUEST_IMAGE" => Self::RequestImage(payload.to_string()),
            _ => Self::Plain(line.to_string()),
        }
    }

    /// Wire tag for this frame, or `None` for the tagless variants.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            Self::Message(_) => Some("MESSAGE"),
            Self::Client(_) => Some("CLIENT"),
            Self::Image(_) => Some("IMAGE"),
            Self::ServerImage(_) => Some("SERVER_IMAGE"),
            Self::ImageReceived { .. } => Some("IMAGE_RECEIVED"),
            Self::ImageList(_) => Some("IMAGE_LIST"),
            Self::ImageError(_) => Some("IMAGE_ERROR"),
            Self::RequestList => Some("REQUEST_LIST"),
            Self::RequestImage(_) => Some("REQUEST_IMAGE"),
            Self::Ping | Self::Plain(_) => None,
        }
    }

    /// Serialize to the wire shape `TAG:payload\n` as one contiguous buffer.
    ///
    /// The caller writes the returned buffer in a single atomic write so
    /// frames never interleave on a shared connection.
    ///
    /// # Errors
    ///
    /// Only `IMAGE_LIST` serialization can fail (JSON encoding).
    pub fn encode(&self) -> Result<Bytes> {
        let line = match self {
            Self::Message(chat) => format!("MESSAGE:{}", chat.to_wire()),
            Self::Client(text) => format!("CLIENT:{text}"),
            Self::Image(payload) => format!("IMAGE:{}", payload.as_str()),
            Self::ServerImage(payload) => format!("SERVER_IMAGE:{}", payload.as_str()),
            Self::ImageReceived { sender, filename } => {
                format!("IMAGE_RECEIVED:{sender}|{filename}")
            },
            Self::ImageList(names) => format!("IMAGE_LIST:{}", serde_json::to_string(names)?),
            Self::ImageError(text) => format!("IMAGE_ERROR:{text}"),
            Self::RequestList => "REQUEST_LIST".to_string(),
            Self::RequestImage(filename) => format!("REQUEST_IMAGE:{filename}"),
            Self::Ping => "ping".to_string(),
            Self::Plain(text) => text.clone(),
        };

        let mut buf = BytesMut::with_capacity(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');
        Ok(buf.freeze())
    }
}
