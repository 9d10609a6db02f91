//! Per-node state aggregate.
//!
//! `LocalStore` owns everything a single process needs: its own node
//! (identity, chain, keys), the registry of every other node it has
//! mirrored state for, the set of transactions it has received and not
//! yet spent, the set of sources it has already seen (double-spend
//! guard), and a handle to the main chain.

use std::collections::HashSet;
use std::sync::{Arc, RwLock as StdRwLock};

use tokio::sync::Mutex as AsyncMutex;

use crate::abstract_cache::AbstractCache;
use crate::chain::{Block, BlockAbstract};
use crate::communication::{CommunicationHelper, PeerTransport};
use crate::config::Config;
use crate::main_chain::MainChainClient;
use crate::proof::{Proof, ProofVerifier};
use crate::registry::{Node, NodeLookup, NodeRegistry};
use crate::transaction::Transaction;
use crate::{Error, NodeId, Result};

pub struct LocalStore {
    pub own_id: NodeId,
    pub registry: NodeRegistry,
    pub main_chain: Arc<dyn MainChainClient>,
    pub abstract_cache: AbstractCache,
    pub config: Config,
    unspent: StdRwLock<HashSet<Transaction>>,
    consumed_sources: StdRwLock<HashSet<(NodeId, u32, u32)>>,
    /// Signed abstracts for own blocks not yet confirmed committed to the
    /// main chain, oldest first. `commit_pending` drains this in order;
    /// a failed commit leaves it (and everything after it) queued for the
    /// next call, per spec.md §7's at-least-once commit semantics.
    pending_commits: StdRwLock<Vec<BlockAbstract>>,
    node_lookup: Option<Arc<dyn NodeLookup>>,
    /// Serializes `receive` so unspent-set, consumed-source, and
    /// meta-knowledge updates are atomic with validation (spec.md §5).
    receive_lock: AsyncMutex<()>,
}

impl LocalStore {
    /// Registers `own_node` and starts the `AbstractCache` against
    /// `main_chain`, blocking until its first update succeeds.
    pub async fn new(own_node: Node, main_chain: Arc<dyn MainChainClient>, node_lookup: Option<Arc<dyn NodeLookup>>, config: Config) -> Self {
        let own_id = own_node.id;
        let registry = NodeRegistry::new();
        registry.register(own_node);
        let abstract_cache = AbstractCache::start(main_chain.clone(), &config).await;
        Self {
            own_id,
            registry,
            main_chain,
            abstract_cache,
            config,
            unspent: StdRwLock::new(HashSet::new()),
            consumed_sources: StdRwLock::new(HashSet::new()),
            pending_commits: StdRwLock::new(Vec::new()),
            node_lookup,
            receive_lock: AsyncMutex::new(()),
        }
    }

    /// A shared handle to this process's own node record.
    pub fn own_node(&self) -> Arc<StdRwLock<Node>> {
        self.registry.get(self.own_id).expect("own node is always registered")
    }

    /// Ensures `id` is in the registry, consulting the node lookup (the
    /// tracker, out of scope for this crate) on a miss.
    pub async fn ensure_known(&self, id: NodeId) -> Result<()> {
        if self.registry.get(id).is_some() {
            return Ok(());
        }
        let lookup = self
            .node_lookup
            .as_ref()
            .ok_or_else(|| Error::Internal(format!("node {id} unknown and no node lookup configured")))?;
        let node = lookup
            .lookup(id)
            .await
            .ok_or_else(|| Error::Internal(format!("node {id} not found via node lookup")))?;
        self.registry.register(node);
        Ok(())
    }

    /// Appends `transactions` as a new block on this node's own chain,
    /// signs the resulting `BlockAbstract` with its secret key, and queues
    /// it for commitment. The other half of spec.md §2's send-side flow:
    /// `LocalStore.ownChain → Block(tx) → abstract`. Does not itself talk
    /// to the main chain; call [`LocalStore::commit_pending`] (or
    /// [`LocalStore::send`], which does so automatically) to submit it.
    pub fn append_own_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let mut own = self.own_node().write().expect("lock poisoned");
        let secret_key = own
            .secret_key
            .ok_or_else(|| Error::Internal(format!("node {} has no secret key to sign its own blocks", self.own_id)))?;
        let block = own.chain.append(transactions).clone();
        drop(own);

        let abstract_ = BlockAbstract {
            owner_id: self.own_id,
            block_number: block.number,
            block_hash: block.hash(),
            signature: crate::crypto::sign(&BlockAbstract::signing_bytes(self.own_id, block.number, block.hash()), &secret_key),
        };
        self.pending_commits.write().expect("lock poisoned").push(abstract_);
        Ok(block)
    }

    /// Drives every queued abstract through `MainChainClient::commit`, in
    /// order, via the `AbstractCache`. Stops and returns the first error
    /// encountered, leaving the failing abstract (and anything still behind
    /// it) queued for the next call — at-least-once commit semantics per
    /// spec.md §7; the main chain is expected to provide idempotence by
    /// hash.
    pub async fn commit_pending(&self) -> Result<()> {
        loop {
            let next = self.pending_commits.read().expect("lock poisoned").first().cloned();
            let Some(abstract_) = next else { return Ok(()) };
            self.abstract_cache.commit(abstract_).await?;
            self.pending_commits.write().expect("lock poisoned").remove(0);
        }
    }

    /// `send(tx)`: commits any abstracts still pending from earlier own
    /// blocks, then hands off to [`CommunicationHelper::send`]. This is the
    /// one integration point between the commit half of spec.md §2's data
    /// flow and the proof/transport half; callers should prefer this over
    /// constructing a `CommunicationHelper` directly so a block is never
    /// proven to a peer before its abstract has at least been attempted.
    pub async fn send(&self, tx: &Transaction, receiver_id: NodeId, transport: &dyn PeerTransport) -> Result<()> {
        self.commit_pending().await?;
        let helper = CommunicationHelper::new(&self.registry, self.own_id, &self.abstract_cache);
        helper.send(tx, receiver_id, transport).await
    }

    pub fn unspent(&self) -> Vec<Transaction> {
        self.unspent.read().expect("lock poisoned").iter().cloned().collect()
    }

    pub fn is_consumed(&self, chain_owner_id: NodeId, block_number: u32, number: u32) -> bool {
        self.consumed_sources
            .read()
            .expect("lock poisoned")
            .contains(&(chain_owner_id, block_number, number))
    }

    /// Verifies and, on success, commits `(transaction, proof)` delivered
    /// by `proof_sender_id`. Mutually exclusive with any other `receive`
    /// call on this store, so the unspent set, consumed-source index, and
    /// meta-knowledge stay consistent with one another.
    pub async fn receive(&self, proof_sender_id: NodeId, proof: Proof) -> Result<()> {
        let _guard = self.receive_lock.lock().await;

        let consumed = self.consumed_sources.read().expect("lock poisoned").clone();
        let verifier = ProofVerifier::new(&self.registry, self.own_id, &self.abstract_cache, self.main_chain.as_ref());
        verifier.verify(&proof, &consumed).await?;
        verifier.apply(&proof, proof_sender_id)?;

        let tx = proof.transaction;
        {
            let mut consumed = self.consumed_sources.write().expect("lock poisoned");
            for source in &tx.sources {
                consumed.insert((source.chain_owner_id, source.block_number, source.number));
            }
        }
        if tx.amount > 0 && tx.receiver_id == self.own_id {
            self.unspent.write().expect("lock poisoned").insert(tx);
        }
        Ok(())
    }
}
