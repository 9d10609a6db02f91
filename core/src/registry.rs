//! Process-wide node registry.
//!
//! Resolves the cyclic object graph (`Node` ↔ `Chain` ↔ `Block` ↔
//! `Transaction.sources` → `Transaction` whose sender is a `Node`) by
//! keying every reference on `id` and looking nodes up here, rather than
//! holding direct references between them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::crypto::{PublicKeyBytes, SecretSeed};
use crate::{Chain, MetaKnowledge, NodeId};

/// A participant in the ledger, as known locally.
///
/// `chain` is this process's mirror of `id`'s chain (authoritative if
/// `id` is the local node itself, a cache of proven blocks otherwise).
/// `meta_knowledge` is this process's belief about what `id`, *as a peer*,
/// already knows of every owner's chain (see `meta_knowledge` module docs).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub public_key: PublicKeyBytes,
    /// `Some` only for the local node's own identity.
    pub secret_key: Option<SecretSeed>,
    pub address: String,
    pub chain: Chain,
    pub meta_knowledge: MetaKnowledge,
}

impl Node {
    pub fn new(id: NodeId, public_key: PublicKeyBytes, address: impl Into<String>, genesis: crate::Block) -> Self {
        Self {
            id,
            public_key,
            secret_key: None,
            address: address.into(),
            chain: Chain::new(id, genesis),
            meta_knowledge: MetaKnowledge::new(),
        }
    }

    pub fn with_secret_key(mut self, secret_key: SecretSeed) -> Self {
        self.secret_key = Some(secret_key);
        self
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Node {}

/// Looks up nodes this registry has never seen, e.g. against the tracker.
/// The tracker itself is out of scope for this crate (see `spec.md` §1);
/// this is the seam a caller plugs a real implementation into.
#[async_trait::async_trait]
pub trait NodeLookup: Send + Sync {
    async fn lookup(&self, id: NodeId) -> Option<Node>;
}

/// Process-wide table of known nodes, keyed by id.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Arc<RwLock<Node>>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `node`, replacing any prior entry with the same id.
    pub fn register(&self, node: Node) -> Arc<RwLock<Node>> {
        let handle = Arc::new(RwLock::new(node));
        let id = handle.read().expect("lock poisoned").id;
        self.nodes.write().expect("lock poisoned").insert(id, handle.clone());
        handle
    }

    /// A shared handle to node `id`, if known.
    pub fn get(&self, id: NodeId) -> Option<Arc<RwLock<Node>>> {
        self.nodes.read().expect("lock poisoned").get(&id).cloned()
    }

    /// All registered ids, in unspecified order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.read().expect("lock poisoned").keys().copied().collect()
    }

    /// A cheap snapshot of node `id`'s chain, if known.
    pub fn chain_snapshot(&self, id: NodeId) -> Option<Chain> {
        self.get(id).map(|handle| handle.read().expect("lock poisoned").chain.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Block;

    #[test]
    fn register_and_get_round_trips() {
        let registry = NodeRegistry::new();
        let node = Node::new(1, [0u8; 32], "127.0.0.1:9000", Block::genesis(1, None));
        registry.register(node);
        assert!(registry.get(1).is_some());
        assert!(registry.get(2).is_none());
        assert_eq!(registry.ids(), vec![1]);
    }
}
