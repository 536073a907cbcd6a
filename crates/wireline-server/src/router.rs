//! Message router: classifies decoded frames and produces relay actions.
//!
//! Dispatch is a pure function of the frame tag plus the sender's address;
//! the protocol is stateless at the frame level, so no per-connection
//! session state exists. The router performs image store I/O but no network
//! I/O: it returns [`RelayAction`]s for the connection task to execute,
//! which keeps every routing decision unit-testable without sockets.

use std::net::SocketAddr;

use wireline_proto::{ChatPayload, Frame, ImagePayload};

use crate::store::{ImageStore, StoreError};

/// Routing outcome for one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a frame to the originating connection only.
    Reply(Frame),

    /// Fan a frame out to all registered connections.
    Broadcast {
        /// Frame to deliver.
        frame: Frame,
        /// Connection id excluded from delivery, if any.
        exclude: Option<u64>,
    },
}

/// Router policy knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterConfig {
    /// When set, relayed chat is not echoed back to its sender.
    pub chat_exclude_sender: bool,
}

/// Per-frame dispatcher over the image store.
#[derive(Debug)]
pub struct Router {
    store: ImageStore,
    config: RouterConfig,
}

impl Router {
    /// Create a router over the given store.
    pub fn new(store: ImageStore, config: RouterConfig) -> Self {
        Self { store, config }
    }

    /// The image store this router writes uploads to and serves fetches
    /// from.
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Dispatch one decoded frame from the peer at `sender_addr`.
    ///
    /// Protocol and filesystem errors are converted into `IMAGE_ERROR`
    /// replies or log lines; nothing this function does can tear down the
    /// connection.
    pub fn route(&self, frame: Frame, sender_id: u64, sender_addr: SocketAddr) -> Vec<RelayAction> {
        match frame {
            Frame::Client(text) => self.route_chat(&text, sender_id, sender_addr),
            Frame::Image(payload) => self.route_upload(&payload, sender_id, sender_addr),
            Frame::RequestList => self.route_list_request(sender_addr),
            Frame::RequestImage(name) => self.route_fetch(&name, sender_addr),
            Frame::Ping => Vec::new(),
            Frame::Plain(line) => {
                tracing::debug!("dropping unrecognized line from {sender_addr}: {line:.80}");
                Vec::new()
            },
            // Hub-to-peer tags arriving inbound: tolerated and dropped.
            Frame::Message(_)
            | Frame::ServerImage(_)
            | Frame::ImageReceived { .. }
            | Frame::ImageList(_)
            | Frame::ImageError(_) => {
                tracing::debug!("dropping hub-bound frame from {sender_addr}");
                Vec::new()
            },
        }
    }

    /// Chat relay: `CLIENT:text` becomes a `MESSAGE:<ip> | text` broadcast.
    fn route_chat(&self, text: &str, sender_id: u64, sender_addr: SocketAddr) -> Vec<RelayAction> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        tracing::info!("chat from {sender_addr}: {text}");
        let chat = ChatPayload::from_sender(sender_addr.ip().to_string(), text);
        vec![RelayAction::Broadcast {
            frame: Frame::Message(chat),
            exclude: self.config.chat_exclude_sender.then_some(sender_id),
        }]
    }

    /// Upload: decode, persist under the inbound directory, notify others.
    fn route_upload(
        &self,
        payload: &ImagePayload,
        sender_id: u64,
        sender_addr: SocketAddr,
    ) -> Vec<RelayAction> {
        let (filename, bytes) = match payload.decode() {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::warn!("invalid image upload from {sender_addr}: {err}");
                return vec![RelayAction::Reply(Frame::ImageError(format!(
                    "invalid image upload: {err}"
                )))];
            },
        };

        let stored = match self.store.save_inbound(sender_addr.ip(), &filename, &bytes) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::error!("failed to store upload from {sender_addr}: {err}");
                return vec![RelayAction::Reply(Frame::ImageError(format!(
                    "failed to store image: {err}"
                )))];
            },
        };

        tracing::info!("image received and saved: {stored} ({} bytes)", bytes.len());
        vec![RelayAction::Broadcast {
            frame: Frame::ImageReceived { sender: sender_addr.ip().to_string(), filename: stored },
            exclude: Some(sender_id),
        }]
    }

    /// Catalog listing, replied to the requester only.
    fn route_list_request(&self, sender_addr: SocketAddr) -> Vec<RelayAction> {
        match self.store.catalog() {
            Ok(names) => {
                tracing::debug!("catalog list for {sender_addr}: {} entries", names.len());
                vec![RelayAction::Reply(Frame::ImageList(names))]
            },
            Err(err) => {
                tracing::error!("catalog listing failed: {err}");
                vec![RelayAction::Reply(Frame::ImageError(format!("catalog unavailable: {err}")))]
            },
        }
    }

    /// Catalog fetch, replied to the requester only (point-to-point).
    fn route_fetch(&self, name: &str, sender_addr: SocketAddr) -> Vec<RelayAction> {
        match self.store.load_catalog(name) {
            Ok(bytes) => {
                tracing::info!("sending catalog image {name} to {sender_addr}");
                vec![RelayAction::Reply(Frame::ServerImage(ImagePayload::from_bytes(
                    name, &bytes,
                )))]
            },
            Err(err @ (StoreError::NotFound(_) | StoreError::InvalidName(_))) => {
                tracing::debug!("catalog fetch for {sender_addr} rejected: {err}");
                vec![RelayAction::Reply(Frame::ImageError(err.to_string()))]
            },
            Err(err) => {
                tracing::error!("catalog read of {name} failed: {err}");
                vec![RelayAction::Reply(Frame::ImageError(format!("failed to read {name}: {err}")))]
            },
        }
    }
}
