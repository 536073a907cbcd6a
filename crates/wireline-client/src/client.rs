//! TCP client for the Wireline relay.
//!
//! Thin transport layer: frames go out through a channel, decoded
//! [`ClientEvent`]s come back on another, and an internal task owns the
//! socket and the receive buffer. `ping` probes are discarded here; the
//! consumer never sees them.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};
use wireline_proto::{CodecConfig, Frame, FrameCodec, ImagePayload};

use crate::event::ClientEvent;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The connection task has stopped; no more frames can be sent.
    #[error("connection closed")]
    Closed,

    /// Local file I/O failed (reading an image to send).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory delivered images are saved under.
    pub download_dir: PathBuf,
    /// Receive buffer bounds.
    pub codec: CodecConfig,
    /// Event channel capacity.
    pub event_capacity: usize,
    /// Ask the hub for its catalog immediately after connecting.
    pub request_list_on_connect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("client_received_images"),
            codec: CodecConfig::default(),
            event_capacity: 32,
            request_list_on_connect: true,
        }
    }
}

/// Handle to a connected relay client.
///
/// Send primitives enqueue frames for the connection task; decoded events
/// arrive on the receiver returned by [`RelayClient::connect`]. Dropping the
/// handle closes the outbound channel and ends the connection task.
pub struct RelayClient {
    to_server: mpsc::Sender<Frame>,
    abort_handle: tokio::task::AbortHandle,
}

impl RelayClient {
    /// Connect to a relay and spawn the connection task.
    ///
    /// Returns the client handle and the event stream.
    pub async fn connect(
        server_addr: &str,
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), ClientError> {
        let stream = TcpStream::connect(server_addr)
            .await
            .map_err(|e| ClientError::Connection(format!("connect to {server_addr}: {e}")))?;

        std::fs::create_dir_all(&config.download_dir)?;

        let (to_server_tx, to_server_rx) = mpsc::channel::<Frame>(32);
        let (events_tx, events_rx) = mpsc::channel::<ClientEvent>(config.event_capacity.max(1));

        if config.request_list_on_connect {
            // Channel capacity is fresh; this cannot block.
            let _ = to_server_tx.try_send(Frame::RequestList);
        }

        let handle = tokio::spawn(run_connection(stream, to_server_rx, events_tx, config));

        Ok((
            Self { to_server: to_server_tx, abort_handle: handle.abort_handle() },
            events_rx,
        ))
    }

    /// Send chat text to the hub.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send_frame(Frame::Client(text.into())).await
    }

    /// Upload image bytes under the given filename.
    pub async fn send_image_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(), ClientError> {
        self.send_frame(Frame::Image(ImagePayload::from_bytes(filename, bytes))).await
    }

    /// Read an image file and upload it under its own filename.
    pub async fn send_image(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image.bin");
        self.send_image_bytes(filename, &bytes).await
    }

    /// Ask the hub for its catalog listing.
    pub async fn request_list(&self) -> Result<(), ClientError> {
        self.send_frame(Frame::RequestList).await
    }

    /// Ask the hub for one catalog image by filename.
    pub async fn request_image(&self, filename: impl Into<String>) -> Result<(), ClientError> {
        self.send_frame(Frame::RequestImage(filename.into())).await
    }

    /// Stop the connection task.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }

    async fn send_frame(&self, frame: Frame) -> Result<(), ClientError> {
        self.to_server.send(frame).await.map_err(|_| ClientError::Closed)
    }
}

/// Run the connection: bridge outbound frames and decode inbound events.
async fn run_connection(
    stream: TcpStream,
    mut to_server: mpsc::Receiver<Frame>,
    events: mpsc::Sender<ClientEvent>,
    config: ClientConfig,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    let mut codec = FrameCodec::new(config.codec);
    let mut buf = [0u8; 8192];

    loop {
        tokio::select! {
            outbound = to_server.recv() => match outbound {
                Some(frame) => match frame.encode() {
                    Ok(wire) => {
                        if let Err(e) = write_half.write_all(&wire).await {
                            tracing::debug!("send failed: {e}");
                            let _ = events.send(ClientEvent::Disconnected).await;
                            break;
                        }
                    },
                    Err(e) => tracing::error!("failed to encode outbound frame: {e}"),
                },
                // All client handles dropped.
                None => break,
            },
            read = read_half.read(&mut buf) => match read {
                Ok(0) => {
                    let _ = events.send(ClientEvent::Disconnected).await;
                    break;
                },
                Ok(n) => {
                    for frame in codec.feed(&buf[..n]) {
                        if let Some(event) = decode_event(frame, &config.download_dir) {
                            if events.send(event).await.is_err() {
                                // Consumer went away; stop reading.
                                return;
                            }
                        }
                    }
                },
                Err(e) => {
                    tracing::debug!("read error: {e}");
                    let _ = events.send(ClientEvent::Disconnected).await;
                    break;
                },
            },
        }
    }
}

/// Turn one inbound frame into a consumer event, or discard it.
fn decode_event(frame: Frame, download_dir: &Path) -> Option<ClientEvent> {
    match frame {
        Frame::Ping => None,
        Frame::Message(chat) => Some(ClientEvent::Chat { sender: chat.sender, text: chat.text }),
        Frame::ImageReceived { sender, filename } => {
            Some(ClientEvent::ImageNotice { sender, filename })
        },
        Frame::ImageList(names) => Some(ClientEvent::Catalog(names)),
        Frame::ImageError(text) => Some(ClientEvent::Error(text)),
        Frame::ServerImage(payload) => Some(save_delivered_image(&payload, download_dir)),
        Frame::Plain(line) => {
            tracing::debug!("ignoring unrecognized line: {line:.80}");
            None
        },
        // Peer-to-hub tags have no business arriving here.
        Frame::Client(_) | Frame::Image(_) | Frame::RequestList | Frame::RequestImage(_) => {
            tracing::debug!("ignoring hub-bound frame from server");
            None
        },
    }
}

/// Decode a delivered image and save it under the download directory.
///
/// Decode and disk failures become [`ClientEvent::Error`]; they never end
/// the connection.
fn save_delivered_image(payload: &ImagePayload, download_dir: &Path) -> ClientEvent {
    let (filename, bytes) = match payload.decode() {
        Ok(decoded) => decoded,
        Err(e) => return ClientEvent::Error(format!("invalid delivered image: {e}")),
    };

    let safe_name = Path::new(&filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| *name != "..")
        .unwrap_or("image.bin");
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let saved = format!("{timestamp}_server_{safe_name}");
    let path = download_dir.join(&saved);

    match std::fs::write(&path, &bytes) {
        Ok(()) => ClientEvent::ImageSaved { filename, path },
        Err(e) => ClientEvent::Error(format!("failed to save {filename}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(decode_event(Frame::Ping, dir.path()), None);
    }

    #[test]
    fn chat_frame_becomes_chat_event() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::parse("MESSAGE:10.0.0.1 | hello");
        assert_eq!(decode_event(frame, dir.path()), Some(ClientEvent::Chat {
            sender: Some("10.0.0.1".to_string()),
            text: "hello".to_string(),
        }));
    }

    #[test]
    fn legacy_separator_still_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::parse("MESSAGE:10.0.0.1: hello");
        assert_eq!(decode_event(frame, dir.path()), Some(ClientEvent::Chat {
            sender: Some("10.0.0.1".to_string()),
            text: "hello".to_string(),
        }));
    }

    #[test]
    fn delivered_image_is_saved_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let payload = ImagePayload::from_bytes("cat.png", &[1, 2, 3]);

        let event = decode_event(Frame::ServerImage(payload), dir.path());
        let Some(ClientEvent::ImageSaved { filename, path }) = event else {
            panic!("expected ImageSaved, got {event:?}");
        };

        assert_eq!(filename, "cat.png");
        let saved_name = path.file_name().unwrap().to_str().unwrap();
        assert!(saved_name.ends_with("_server_cat.png"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn bad_delivered_image_becomes_error_event() {
        let dir = tempfile::tempdir().unwrap();
        let payload = ImagePayload::new("broken");

        let event = decode_event(Frame::ServerImage(payload), dir.path());
        assert!(matches!(event, Some(ClientEvent::Error(_))));
    }

    #[test]
    fn image_list_becomes_catalog_event() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::parse(r#"IMAGE_LIST:["a.png"]"#);
        assert_eq!(
            decode_event(frame, dir.path()),
            Some(ClientEvent::Catalog(vec!["a.png".to_string()]))
        );
    }
}
