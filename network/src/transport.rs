//! Concrete, `tokio`-based [`PeerTransport`].
//!
//! One TCP connection per send; transfers are infrequent enough under
//! spec.md's send/receive model that connection pooling would add state
//! this crate doesn't need yet.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use libp2p::PeerId;
use obscura_core::communication::PeerTransport;
use obscura_core::{Error, NodeId, NodeRegistry, Proof, Result, Transaction};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::message::{self, Envelope};

pub struct TcpPeerTransport {
    registry: Arc<NodeRegistry>,
    local_peer_id: PeerId,
}

impl TcpPeerTransport {
    pub fn new(registry: Arc<NodeRegistry>, local_peer_id: PeerId) -> Self {
        Self { registry, local_peer_id }
    }

    fn peer_address(&self, id: NodeId) -> Result<SocketAddr> {
        let address = self
            .registry
            .get(id)
            .ok_or_else(|| Error::TransportError(format!("unknown peer {id}")))?
            .read()
            .expect("lock poisoned")
            .address
            .clone();
        address.parse().map_err(|err| Error::TransportError(format!("invalid address {address:?} for peer {id}: {err}")))
    }
}

#[async_trait]
impl PeerTransport for TcpPeerTransport {
    async fn send(&self, to: NodeId, tx: Transaction, proof: Proof) -> Result<()> {
        let socket_addr = self.peer_address(to)?;
        let mut stream = TcpStream::connect(socket_addr)
            .await
            .map_err(|err| Error::TransportError(format!("connecting to peer {to} at {socket_addr}: {err}")))?;

        let envelope = Envelope::new(self.local_peer_id, tx, proof);
        message::write_message(&mut stream, &envelope)
            .await
            .map_err(|err| Error::TransportError(format!("sending to peer {to}: {err}")))?;
        debug!(peer = to, %socket_addr, "sent envelope");
        Ok(())
    }
}

/// The inbound half: accepts connections and decodes whatever arrives on
/// them. Resolving the sender's `PeerId` back to a `NodeId` and handing the
/// result to a `LocalStore` is the caller's job — this type only owns the
/// socket.
pub struct PeerServer {
    listener: TcpListener,
}

impl PeerServer {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        Ok(Self { listener: TcpListener::bind(addr).await? })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one inbound connection and decodes its envelope. Callers
    /// typically loop this in a dedicated task.
    pub async fn accept(&self) -> message::Result<(SocketAddr, Envelope)> {
        let (mut stream, peer_addr) = self.listener.accept().await?;
        let envelope = message::read_message(&mut stream).await?;
        Ok((peer_addr, envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_core::proof::ChainUpdates;
    use obscura_core::{Block, Node};

    fn sample_proof() -> Proof {
        let tx = Transaction {
            number: 0,
            sender_id: None,
            receiver_id: 2,
            amount: 5,
            remainder: 0,
            sources: vec![],
            block_number: Some(0),
            signature: vec![],
        };
        Proof { transaction: tx, chain_updates: ChainUpdates::new() }
    }

    #[tokio::test]
    async fn send_delivers_to_a_listening_peer_server() {
        let server = PeerServer::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let registry = Arc::new(NodeRegistry::new());
        registry.register(Node::new(2, [2u8; 32], addr.to_string(), Block::genesis(2, None)));

        let local_peer_id = PeerId::random();
        let transport = TcpPeerTransport::new(registry, local_peer_id);

        let proof = sample_proof();
        let send = transport.send(2, proof.transaction.clone(), proof.clone());
        let accept = server.accept();

        let (send_result, accept_result) = tokio::join!(send, accept);
        send_result.unwrap();
        let (_, envelope) = accept_result.unwrap();
        assert_eq!(envelope.transaction.receiver_id, 2);
        assert_eq!(envelope.from_peer_id(), Some(local_peer_id));
    }

    #[tokio::test]
    async fn send_to_unknown_peer_fails() {
        let registry = Arc::new(NodeRegistry::new());
        let transport = TcpPeerTransport::new(registry, PeerId::random());
        let proof = sample_proof();
        assert!(transport.send(9, proof.transaction.clone(), proof).await.is_err());
    }
}
