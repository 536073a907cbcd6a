//! Broadcast engine: best-effort fan-out with partial-failure eviction.

use wireline_proto::Frame;

use crate::{error::ServerError, registry::ConnectionRegistry};

/// Send one frame to every registered connection except `exclude`.
///
/// The frame is serialized once and written to a point-in-time registry
/// snapshot, so the registry lock is never held across a network write. A
/// failed write never aborts the loop; after the fan-out pass every failed
/// connection is removed from the registry in one batched update and its
/// socket shut down. Returns the number of successful deliveries.
///
/// Delivery is best-effort and unordered across peers; within one peer the
/// per-connection writer lock keeps this frame atomic on the wire.
pub async fn broadcast(
    registry: &ConnectionRegistry,
    frame: &Frame,
    exclude: Option<u64>,
) -> Result<usize, ServerError> {
    let wire = frame.encode()?;
    let peers = registry.snapshot();

    let mut delivered = 0;
    let mut failed = Vec::new();
    for peer in &peers {
        if Some(peer.id()) == exclude {
            continue;
        }
        match peer.send_bytes(&wire).await {
            Ok(()) => delivered += 1,
            Err(err) => {
                tracing::debug!("broadcast write to {} failed: {err}", peer.addr());
                failed.push(peer.id());
            },
        }
    }

    if !failed.is_empty() {
        for peer in registry.remove_many(&failed) {
            peer.shutdown().await;
            tracing::info!("evicted {} after failed broadcast write", peer.addr());
        }
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{
        io::AsyncReadExt,
        net::{TcpListener, TcpStream},
    };
    use wireline_proto::{ChatPayload, Frame};

    use super::*;
    use crate::registry::Peer;

    /// A registered peer plus the remote end to read its deliveries from.
    async fn peer_pair(listener: &TcpListener, id: u64) -> (Peer, TcpStream) {
        let addr = listener.local_addr().unwrap();
        let outbound = TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        let peer_addr = accepted.peer_addr().unwrap();
        let (_read, write) = accepted.into_split();
        (Peer::new(id, peer_addr, write), outbound)
    }

    async fn read_line(stream: &mut TcpStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            stream.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_all_peers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ConnectionRegistry::new();

        let (peer_a, mut remote_a) = peer_pair(&listener, 1).await;
        let (peer_b, mut remote_b) = peer_pair(&listener, 2).await;
        registry.add(peer_a);
        registry.add(peer_b);

        let frame = Frame::Message(ChatPayload::from_sender("10.0.0.1", "hi"));
        let delivered = broadcast(&registry, &frame, None).await.unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(read_line(&mut remote_a).await, "MESSAGE:10.0.0.1 | hi");
        assert_eq!(read_line(&mut remote_b).await, "MESSAGE:10.0.0.1 | hi");
    }

    #[tokio::test]
    async fn broadcast_excludes_exactly_one_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ConnectionRegistry::new();

        let (peer_a, mut remote_a) = peer_pair(&listener, 1).await;
        let (peer_b, mut remote_b) = peer_pair(&listener, 2).await;
        let (peer_c, mut remote_c) = peer_pair(&listener, 3).await;
        registry.add(peer_a);
        registry.add(peer_b);
        registry.add(peer_c);

        let frame = Frame::Client("x".to_string());
        let delivered = broadcast(&registry, &frame, Some(2)).await.unwrap();
        assert_eq!(delivered, 2);

        assert_eq!(read_line(&mut remote_a).await, "CLIENT:x");
        assert_eq!(read_line(&mut remote_c).await, "CLIENT:x");

        // The excluded peer sees nothing; a zero-byte read after the remote
        // write side closes would be the only other outcome.
        let mut buf = [0u8; 1];
        let got = tokio::time::timeout(Duration::from_millis(200), remote_b.read(&mut buf)).await;
        assert!(got.is_err(), "excluded peer must not receive the frame");
    }

    #[tokio::test]
    async fn failed_writes_evict_only_broken_peers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let registry = ConnectionRegistry::new();

        let (peer_a, mut remote_a) = peer_pair(&listener, 1).await;
        let (peer_b, remote_b) = peer_pair(&listener, 2).await;
        registry.add(peer_a);
        registry.add(peer_b.clone());

        // Break peer B: close the remote end and shut our write half so
        // writes fail immediately.
        drop(remote_b);
        peer_b.shutdown().await;

        let frame = Frame::Client("after-break".to_string());
        let delivered = broadcast(&registry, &frame, None).await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(read_line(&mut remote_a).await, "CLIENT:after-break");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].id(), 1);
    }
}
