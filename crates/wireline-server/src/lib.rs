//! Wireline relay hub.
//!
//! Relays text and image frames between one hub process and any number of
//! persistent peer connections over raw TCP, one newline-delimited stream
//! per connection.
//!
//! # Architecture
//!
//! Each accepted connection gets one reader task and one keepalive writer
//! task. The reader owns that connection's receive buffer, feeds it through
//! the [`wireline_proto::FrameCodec`], and dispatches every decoded frame to
//! the [`Router`], executing the resulting actions (point-to-point replies
//! and registry-wide broadcasts). The keepalive task independently emits
//! `ping` probes and tears the connection down on the first failed write.
//! The accept loop is never blocked by connection I/O.
//!
//! # Components
//!
//! - [`ConnectionRegistry`]: lock-protected set of live peers
//! - [`broadcast`]: best-effort fan-out with partial-failure eviction
//! - [`Router`]: per-frame dispatch over the [`ImageStore`]
//! - [`RelayServer`]: accept loop and per-connection tasks
//! - [`RelayHandle`]: operator surface (catalog push, introspection,
//!   shutdown)

mod broadcast;
mod config;
mod error;
mod registry;
mod router;
mod store;

use std::{net::SocketAddr, sync::Arc, time::Duration};

pub use broadcast::broadcast;
use bytes::BytesMut;
pub use config::{
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_MAX_CONNECTIONS, DEFAULT_READ_TIMEOUT, RelayConfig,
};
pub use error::ServerError;
pub use registry::{ConnectionRegistry, Peer};
pub use router::{RelayAction, Router, RouterConfig};
pub use store::{ImageStore, StoreError};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, tcp::OwnedReadHalf},
    sync::watch,
    time::timeout,
};
use wireline_proto::{Frame, FrameCodec, ImagePayload};

/// Production relay server: TCP listener plus shared relay state.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    config: RelayConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayServer {
    /// Bind the listener and open the image store directories.
    ///
    /// Bind and directory failures are fatal at startup; everything after
    /// this point is per-connection and recoverable.
    pub async fn bind(config: RelayConfig) -> Result<Self, ServerError> {
        let store = ImageStore::open(&config.inbound_dir, &config.catalog_dir)
            .map_err(|e| ServerError::Config(format!("failed to open image store: {e}")))?;
        let router = Router::new(store, RouterConfig {
            chat_exclude_sender: config.chat_exclude_sender,
        });

        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Config(format!("failed to bind '{}': {e}", config.bind_address))
        })?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            registry: Arc::new(ConnectionRegistry::new()),
            router: Arc::new(router),
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Operator handle, valid for the life of the process.
    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            registry: Arc::clone(&self.registry),
            router: Arc::clone(&self.router),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Accept connections until shutdown, spawning a reader task and a
    /// keepalive writer task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("relay listening on {}", self.local_addr()?);

        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut next_id: u64 = 1;

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if self.registry.len() >= self.config.max_connections {
                            tracing::warn!("max connections reached, dropping {addr}");
                            continue;
                        }

                        let id = next_id;
                        next_id += 1;

                        let (read_half, write_half) = stream.into_split();
                        let peer = Peer::new(id, addr, write_half);
                        self.registry.add(peer.clone());
                        tracing::info!("connection established with {addr}");

                        tokio::spawn(run_reader(
                            read_half,
                            peer.clone(),
                            Arc::clone(&self.registry),
                            Arc::clone(&self.router),
                            self.config.clone(),
                            self.shutdown_rx.clone(),
                        ));
                        tokio::spawn(run_keepalive(
                            peer,
                            Arc::clone(&self.registry),
                            self.config.keepalive_interval,
                            self.shutdown_rx.clone(),
                        ));
                    },
                    Err(e) => tracing::error!("accept error: {e}"),
                },
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                },
            }
        }

        tracing::info!("relay shutting down, closing {} connections", self.registry.len());
        for peer in self.registry.snapshot() {
            self.registry.remove(peer.id());
            peer.shutdown().await;
        }
        Ok(())
    }
}

/// Cloneable operator surface over a running relay.
///
/// External collaborators (console tooling, tests) use this for unsolicited
/// catalog pushes, introspection, and graceful shutdown.
#[derive(Clone)]
pub struct RelayHandle {
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    shutdown: watch::Sender<bool>,
}

impl RelayHandle {
    /// Broadcast a catalog image to every connection, no exclusion.
    ///
    /// Returns the number of successful deliveries.
    pub async fn push_catalog_image(&self, name: &str) -> Result<usize, ServerError> {
        let bytes = self.router.store().load_catalog(name)?;
        let frame = Frame::ServerImage(ImagePayload::from_bytes(name, &bytes));
        let delivered = broadcast(&self.registry, &frame, None).await?;
        tracing::info!("catalog image '{name}' sent to {delivered} peers");
        Ok(delivered)
    }

    /// Current catalog listing.
    pub fn catalog(&self) -> Result<Vec<String>, ServerError> {
        Ok(self.router.store().catalog()?)
    }

    /// Addresses of the currently connected peers.
    pub fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.registry.addrs()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Flip the process-wide shutdown flag. Every task exits on its next
    /// timeout tick; no in-flight call is force-interrupted.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Reader task: owns the receive buffer, decodes frames, routes them.
async fn run_reader(
    mut read_half: OwnedReadHalf,
    peer: Peer,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    config: RelayConfig,
    shutdown: watch::Receiver<bool>,
) {
    let mut codec = FrameCodec::new(config.codec);
    let mut buf = BytesMut::with_capacity(8192);

    loop {
        if *shutdown.borrow() {
            break;
        }

        buf.clear();
        match timeout(config.read_timeout, read_half.read_buf(&mut buf)).await {
            // Timeout tick: loop back and re-check the shutdown flag.
            Err(_) => continue,
            Ok(Ok(0)) => {
                tracing::debug!("{} closed the connection", peer.addr());
                break;
            },
            Ok(Ok(_)) => {
                for frame in codec.feed(&buf) {
                    let actions = router.route(frame, peer.id(), peer.addr());
                    execute_actions(&registry, &peer, actions).await;
                }
            },
            Ok(Err(e)) => {
                tracing::debug!("read error from {}: {e}", peer.addr());
                break;
            },
        }
    }

    teardown(&registry, &peer, "reader").await;
}

/// Keepalive task: periodic liveness probe; detects broken writers.
async fn run_keepalive(
    peer: Peer,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let Ok(wire) = Frame::Ping.encode() else {
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = peer.send_bytes(&wire).await {
                    tracing::debug!("keepalive to {} failed: {e}", peer.addr());
                    break;
                }
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            },
        }
    }

    teardown(&registry, &peer, "keepalive").await;
}

/// Remove a peer from the registry and close its socket.
///
/// Reader, keepalive writer, and broadcast eviction can all race here;
/// `ConnectionRegistry::remove` is idempotent, so exactly one caller
/// performs the teardown.
async fn teardown(registry: &ConnectionRegistry, peer: &Peer, side: &str) {
    if let Some(removed) = registry.remove(peer.id()) {
        removed.shutdown().await;
        tracing::info!("client {} disconnected ({side})", peer.addr());
    }
}

/// Execute routing actions for one inbound frame.
async fn execute_actions(
    registry: &Arc<ConnectionRegistry>,
    origin: &Peer,
    actions: Vec<RelayAction>,
) {
    for action in actions {
        match action {
            RelayAction::Reply(frame) => {
                if let Err(e) = origin.send(&frame).await {
                    // A failed reply is a transport error for this
                    // connection only.
                    tracing::debug!("reply to {} failed: {e}", origin.addr());
                    teardown(registry, origin, "reply").await;
                }
            },
            RelayAction::Broadcast { frame, exclude } => {
                match broadcast(registry, &frame, exclude).await {
                    Ok(delivered) => {
                        tracing::debug!("broadcast delivered to {delivered} peers");
                    },
                    Err(e) => tracing::error!("broadcast failed to encode: {e}"),
                }
            },
        }
    }
}
