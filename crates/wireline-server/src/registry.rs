//! Connection registry: the authoritative set of live peers.
//!
//! All membership changes go through a single mutex so adds, removals, and
//! broadcast snapshots are mutually exclusive. The lock is held only for
//! short map operations, never across a network write: `snapshot` returns an
//! independent copy precisely so one slow or broken peer can never stall the
//! accept loop or other connections' I/O.

use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::{io::AsyncWriteExt, net::tcp::OwnedWriteHalf};
use wireline_proto::Frame;

use crate::error::ServerError;

/// One live connection: id, peer address, and the write half of its socket.
///
/// The write half sits behind a per-peer async mutex; each serialized frame
/// is written under that lock in a single `write_all`, which keeps frames
/// atomic on the wire and in send order for this connection. Clones share
/// the same underlying socket.
#[derive(Clone)]
pub struct Peer {
    id: u64,
    addr: SocketAddr,
    writer: Arc<tokio::sync::Mutex<OwnedWriteHalf>>,
}

impl Peer {
    /// Wrap an accepted connection's write half.
    pub fn new(id: u64, addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self { id, addr, writer: Arc::new(tokio::sync::Mutex::new(writer)) }
    }

    /// Registry id, unique for the life of the process.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote peer address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write one pre-serialized frame as a single atomic operation.
    pub async fn send_bytes(&self, wire: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(wire).await
    }

    /// Serialize and send one frame.
    pub async fn send(&self, frame: &Frame) -> Result<(), ServerError> {
        let wire = frame.encode()?;
        self.send_bytes(&wire).await?;
        Ok(())
    }

    /// Shut the write side down, unblocking the remote reader.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer").field("id", &self.id).field("addr", &self.addr).finish()
    }
}

/// Lock-protected set of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    peers: Mutex<HashMap<u64, Peer>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Peer>> {
        // A poisoned lock only means another task panicked mid-operation;
        // the map itself is always in a consistent state.
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a peer. Returns `false` if the id is already present.
    pub fn add(&self, peer: Peer) -> bool {
        let mut peers = self.lock();
        if peers.contains_key(&peer.id()) {
            return false;
        }
        peers.insert(peer.id(), peer);
        true
    }

    /// Remove a peer by id.
    ///
    /// Idempotent: whichever task (reader, keepalive writer, broadcast
    /// eviction) detects a failure first gets `Some` and performs teardown;
    /// later calls get `None` and do nothing.
    pub fn remove(&self, id: u64) -> Option<Peer> {
        self.lock().remove(&id)
    }

    /// Remove a batch of peers in one registry update, returning those that
    /// were still present.
    pub fn remove_many(&self, ids: &[u64]) -> Vec<Peer> {
        let mut peers = self.lock();
        ids.iter().filter_map(|id| peers.remove(id)).collect()
    }

    /// Point-in-time copy of the membership, ordered by id.
    ///
    /// Never a live view: the caller writes to these peers without holding
    /// the registry lock.
    pub fn snapshot(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.lock().values().cloned().collect();
        peers.sort_by_key(Peer::id);
        peers
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether any connection is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Addresses of all live connections, ordered by registration id.
    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.snapshot().into_iter().map(|peer| peer.addr()).collect()
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    async fn connected_peer(id: u64) -> Peer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let peer_addr = client.local_addr().unwrap();
        let (_read, write) = client.into_split();
        // Keep the accepted side alive long enough for the test body.
        tokio::spawn(async move {
            let _accepted = listener.accept().await;
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        });
        Peer::new(id, peer_addr, write)
    }

    #[tokio::test]
    async fn add_and_snapshot() {
        let registry = ConnectionRegistry::new();
        registry.add(connected_peer(1).await);
        registry.add(connected_peer(2).await);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id(), 1);
        assert_eq!(snapshot[1].id(), 2);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = ConnectionRegistry::new();
        assert!(registry.add(connected_peer(1).await));
        assert!(!registry.add(connected_peer(1).await));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        registry.add(connected_peer(1).await);

        assert!(registry.remove(1).is_some());
        assert!(registry.remove(1).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn remove_many_returns_only_present_peers() {
        let registry = ConnectionRegistry::new();
        registry.add(connected_peer(1).await);
        registry.add(connected_peer(2).await);
        registry.add(connected_peer(3).await);

        let removed = registry.remove_many(&[1, 3, 99]);
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].id(), 2);
    }

    #[tokio::test]
    async fn snapshot_is_a_copy_not_a_view() {
        let registry = ConnectionRegistry::new();
        registry.add(connected_peer(1).await);

        let snapshot = registry.snapshot();
        registry.remove(1);

        // The snapshot still holds the peer even after removal.
        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty());
    }
}
