//! Pure orchestration glue: `send(tx) = construct + transmit`.
//!
//! The receive-side counterpart, `receive(tx, proof) = verify + commit to
//! local state`, is `LocalStore::receive` — there is no separate type for
//! it because the commit step needs the exclusive lock `LocalStore`
//! already holds; duplicating that here would just be a second door into
//! the same room.

use std::sync::Arc;

use async_trait::async_trait;

use crate::abstract_cache::AbstractCache;
use crate::proof::{Proof, ProofConstructor};
use crate::registry::NodeRegistry;
use crate::transaction::Transaction;
use crate::{Error, NodeId, Result};

/// The peer transport this crate requires: deliver a `(transaction,
/// proof)` pair to `to`. Socket framing is out of scope for this crate
/// (see `spec.md` §1); `obscura-network` provides a concrete
/// `tokio`-based implementation.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, to: NodeId, tx: Transaction, proof: Proof) -> Result<()>;
}

/// Orchestrates an outbound send: build the minimal proof, hand it to the
/// transport, then advance this node's belief about what the receiver now
/// knows.
pub struct CommunicationHelper<'a> {
    registry: &'a NodeRegistry,
    own_id: NodeId,
    cache: &'a AbstractCache,
}

impl<'a> CommunicationHelper<'a> {
    pub fn new(registry: &'a NodeRegistry, own_id: NodeId, cache: &'a AbstractCache) -> Self {
        Self { registry, own_id, cache }
    }

    /// `send(tx)`: constructs the minimal proof for `tx` under what this
    /// node currently believes `receiver_id` knows, transmits it, then
    /// advances that belief to match what was just proven.
    pub async fn send(&self, tx: &Transaction, receiver_id: NodeId, transport: &dyn PeerTransport) -> Result<()> {
        let receiver_meta = {
            let handle = self
                .registry
                .get(receiver_id)
                .ok_or_else(|| Error::Internal(format!("unknown receiver {receiver_id}")))?;
            handle.read().expect("lock poisoned").meta_knowledge.clone()
        };

        let constructor = ProofConstructor::new(self.registry);
        let proof = constructor.construct(tx, self.own_id, &receiver_meta, self.cache)?;

        transport.send(receiver_id, tx.clone(), proof.clone()).await?;

        if let Some(handle) = self.registry.get(receiver_id) {
            handle.write().expect("lock poisoned").meta_knowledge.advance_from_proof(&proof);
        }
        Ok(())
    }
}

/// An in-process transport used by this crate's own integration tests and
/// available to downstream crates for theirs: delivers straight into a
/// peer's `LocalStore::receive`.
pub mod testing {
    use super::*;
    use crate::local_store::LocalStore;

    pub struct LoopbackTransport {
        pub from: NodeId,
        pub peer: Arc<LocalStore>,
    }

    #[async_trait]
    impl PeerTransport for LoopbackTransport {
        async fn send(&self, _to: NodeId, tx: Transaction, proof: Proof) -> Result<()> {
            let _ = tx; // the transaction travels inside `proof.transaction`.
            self.peer.receive(self.from, proof).await
        }
    }
}
