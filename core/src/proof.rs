//! Proof construction and verification.
//!
//! A [`Proof`] is the minimal bundle of blocks, per owner, that lets a
//! receiver validate the provenance of every source behind a transaction,
//! bounded by what the receiver already knows (its meta-knowledge).
//! Construction is a worklist traversal over the transaction's source
//! graph (explicit queue rather than recursion, per the design notes, so
//! stack depth doesn't grow with chain depth); verification replays the
//! same structure against the receiver's own state and the main chain's
//! finality oracle.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::abstract_cache::AbstractCache;
use crate::chain::{Block, Chain};
use crate::main_chain::MainChainClient;
use crate::meta_knowledge::MetaKnowledge;
use crate::registry::NodeRegistry;
use crate::transaction::{SourceRef, Transaction};
use crate::{Error, NodeId, Result};

/// Per-owner slices of new blocks accompanying a transaction, in the order
/// they were first produced (insertion order), so proofs are deterministic
/// and testable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainUpdates(Vec<(NodeId, Vec<Block>)>);

impl ChainUpdates {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NodeId, Vec<Block>)> {
        self.0.iter()
    }

    pub fn get(&self, owner: NodeId) -> Option<&Vec<Block>> {
        self.0.iter().find(|(id, _)| *id == owner).map(|(_, blocks)| blocks)
    }

    /// Every block carried by this proof, across all owners.
    pub fn block_count(&self) -> usize {
        self.0.iter().map(|(_, blocks)| blocks.len()).sum()
    }

    /// Merges `candidate` into the entry for `owner`. `candidate` is
    /// guaranteed (by construction: every candidate for the same owner
    /// starts at the same meta-knowledge baseline and is a contiguous
    /// ascending slice) to be a prefix-extension of whatever is already
    /// queued for `owner`. Returns the newly-added suffix, the worklist
    /// seed for recursion; empty if `candidate` added nothing new.
    pub fn merge(&mut self, owner: NodeId, candidate: Vec<Block>) -> Vec<Block> {
        let existing_len = self.get(owner).map(Vec::len).unwrap_or(0);
        if candidate.len() <= existing_len {
            return Vec::new();
        }
        if let Some(existing) = self.get(owner) {
            debug_assert!(
                existing.iter().zip(candidate.iter()).all(|(a, b)| a == b),
                "candidate blocks for node {owner} are not a prefix-extension of what is already queued"
            );
        }
        let fresh = candidate[existing_len..].to_vec();
        match self.0.iter_mut().find(|(id, _)| *id == owner) {
            Some((_, blocks)) => *blocks = candidate,
            None => self.0.push((owner, candidate)),
        }
        fresh
    }
}

/// The minimal bundle of blocks accompanying a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub transaction: Transaction,
    pub chain_updates: ChainUpdates,
}

/// Lowest-numbered committed block with `number >= from_number` on `chain`,
/// or `NotYetCommitted` if none exists yet.
pub fn next_committed_block(chain: &Chain, from_number: u32, cache: &AbstractCache) -> Result<Block> {
    let mut n = from_number;
    loop {
        if n >= chain.len() {
            return Err(Error::NotYetCommitted);
        }
        let block = chain.get(n).expect("n < chain.len()");
        if cache.is_present(&block.hash()) {
            return Ok(block.clone());
        }
        n += 1;
    }
}

/// Builds the minimal [`Proof`] for a transaction under a given receiver's
/// meta-knowledge.
pub struct ProofConstructor<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> ProofConstructor<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    /// Constructs the proof for `tx`, sent by `sender_id`, under
    /// `receiver_meta` (the sender's belief about what the receiver
    /// already knows).
    pub fn construct(&self, tx: &Transaction, sender_id: NodeId, receiver_meta: &MetaKnowledge, cache: &AbstractCache) -> Result<Proof> {
        let block_number = tx
            .block_number
            .ok_or_else(|| Error::Internal("transaction has not been placed in a block".into()))?;

        let mut updates = ChainUpdates::new();
        let mut worklist: VecDeque<Block> = VecDeque::new();

        let sender_chain = self.chain_of(sender_id)?;
        sender_chain
            .get(block_number)
            .ok_or_else(|| Error::Internal(format!("sender {sender_id} has no block {block_number}")))?;
        let committed = next_committed_block(&sender_chain, block_number, cache)?;

        let initial = receiver_meta.blocks_to_send(&sender_chain, committed.number);
        if initial.is_empty() {
            // Receiver already has everything needed from the sender.
            return Ok(Proof { transaction: tx.clone(), chain_updates: updates });
        }
        for block in updates.merge(sender_id, initial) {
            worklist.push_back(block);
        }

        while let Some(block) = worklist.pop_front() {
            for inner_tx in &block.transactions {
                self.process_sources(inner_tx, sender_id, tx.receiver_id, receiver_meta, cache, &mut updates, &mut worklist)?;
            }
        }

        Ok(Proof { transaction: tx.clone(), chain_updates: updates })
    }

    fn process_sources(
        &self,
        inner_tx: &Transaction,
        sender_id: NodeId,
        receiver_id: NodeId,
        receiver_meta: &MetaKnowledge,
        cache: &AbstractCache,
        updates: &mut ChainUpdates,
        worklist: &mut VecDeque<Block>,
    ) -> Result<()> {
        for source in &inner_tx.sources {
            let owner = source.chain_owner_id;
            let owner_chain = self.chain_of(owner)?;
            let source_block = owner_chain
                .get(source.block_number)
                .ok_or_else(|| Error::Internal(format!("node {owner} has no block {}", source.block_number)))?;
            let is_genesis_source = source_block
                .transactions
                .iter()
                .find(|t| t.number == source.number)
                .map(|t| t.is_genesis())
                .unwrap_or(false);
            if is_genesis_source || owner == sender_id || owner == receiver_id {
                continue; // genesis mints need no further provenance; the rest is already scheduled or already known.
            }
            let committed = next_committed_block(&owner_chain, source.block_number, cache)?;
            let candidate = receiver_meta.blocks_to_send(&owner_chain, committed.number);
            if candidate.is_empty() {
                continue;
            }
            for block in updates.merge(owner, candidate) {
                worklist.push_back(block);
            }
        }
        Ok(())
    }

    fn chain_of(&self, owner: NodeId) -> Result<Chain> {
        self.registry
            .chain_snapshot(owner)
            .ok_or_else(|| Error::Internal(format!("unknown node {owner}")))
    }
}

/// Validates a received `(transaction, proof)` pair against local state and
/// the abstract cache. Performs no mutation; see [`ProofVerifier::apply`]
/// for the post-conditions applied only once verification succeeds.
pub struct ProofVerifier<'a> {
    registry: &'a NodeRegistry,
    own_id: NodeId,
    cache: &'a AbstractCache,
    main_chain: &'a dyn MainChainClient,
}

impl<'a> ProofVerifier<'a> {
    pub fn new(registry: &'a NodeRegistry, own_id: NodeId, cache: &'a AbstractCache, main_chain: &'a dyn MainChainClient) -> Self {
        Self { registry, own_id, cache, main_chain }
    }

    /// Runs all six checks from the design in order. Returns `Ok(())` iff
    /// `proof` is sufficient to accept `proof.transaction`.
    pub async fn verify(&self, proof: &Proof, consumed_sources: &HashSet<(NodeId, u32, u32)>) -> Result<()> {
        let tx = &proof.transaction;

        // 1. Structural: per-owner slices are contiguous, and anything the
        //    receiver already has matches byte-for-byte.
        for (owner, blocks) in proof.chain_updates.iter() {
            self.check_structural(*owner, blocks)?;
        }

        // 2. Commitment: the last block of every entry must be finalized.
        for (_owner, blocks) in proof.chain_updates.iter() {
            let Some(last) = blocks.last() else { continue };
            let hash = last.hash();
            if !self.cache.is_present(&hash) {
                if let Ok(status) = self.main_chain.status().await {
                    let _ = self.cache.update_and_wait(status.latest_height).await;
                }
                if !self.cache.is_present(&hash) {
                    return Err(Error::NotFinalized);
                }
            }
        }

        // 3. Signature.
        if let Some(sender_id) = tx.sender_id {
            let sender_public_key = self
                .registry
                .get(sender_id)
                .map(|handle| handle.read().expect("lock poisoned").public_key)
                .ok_or_else(|| Error::Internal(format!("unknown sender {sender_id}")))?;
            if !crate::crypto::verify(&tx.canonical_bytes(), &tx.signature, &sender_public_key) {
                return Err(Error::InvalidSignature);
            }
        }

        // 4 & 5. Source verification + conservation.
        let mut total_sources = 0u64;
        for source in &tx.sources {
            let source_tx = self.locate_source(source, proof)?;
            if source_tx.receiver_id != tx.sender_id.unwrap_or(self.own_id) {
                return Err(Error::ConservationViolation);
            }
            total_sources = total_sources
                .checked_add(source_tx.amount)
                .ok_or_else(|| Error::Internal("source amount overflow".into()))?;
        }
        if !tx.is_genesis() && total_sources != tx.amount + tx.remainder {
            return Err(Error::ConservationViolation);
        }

        // 6. Double-spend guard.
        for source in &tx.sources {
            if consumed_sources.contains(&(source.chain_owner_id, source.block_number, source.number)) {
                return Err(Error::DoubleSpend);
            }
        }

        Ok(())
    }

    fn check_structural(&self, owner: NodeId, blocks: &[Block]) -> Result<()> {
        let local_chain = self.registry.chain_snapshot(owner).ok_or(Error::MissingBlock)?;
        let mut virtual_len = local_chain.len();
        for block in blocks {
            if block.number < local_chain.len() {
                let existing = local_chain.get(block.number).expect("in bounds");
                if existing.hash() != block.hash() {
                    return Err(Error::Internal(format!(
                        "proof block {} for node {owner} conflicts with a previously known block",
                        block.number
                    )));
                }
            } else if block.number == virtual_len {
                virtual_len += 1;
            } else {
                return Err(Error::MissingBlock);
            }
        }
        Ok(())
    }

    fn locate_source(&self, source: &SourceRef, proof: &Proof) -> Result<Transaction> {
        if let Some(tx) = self.find_in_registry(source) {
            return Ok(tx);
        }
        if let Some(blocks) = proof.chain_updates.get(source.chain_owner_id) {
            if let Some(block) = blocks.iter().find(|b| b.number == source.block_number) {
                if let Some(tx) = block.transactions.iter().find(|t| t.number == source.number) {
                    return Ok(tx.clone());
                }
            }
        }
        Err(Error::MissingBlock)
    }

    fn find_in_registry(&self, source: &SourceRef) -> Option<Transaction> {
        let handle = self.registry.get(source.chain_owner_id)?;
        let node = handle.read().expect("lock poisoned");
        let block = node.chain.get(source.block_number)?;
        block.transactions.iter().find(|t| t.number == source.number).cloned()
    }

    /// Post-conditions of a successful verification: append every new
    /// block into this process's mirror of its owner's chain, and advance
    /// this process's belief about what `proof`'s sender already knows.
    pub fn apply(&self, proof: &Proof, proof_sender_id: NodeId) -> Result<()> {
        for (owner, blocks) in proof.chain_updates.iter() {
            let handle = self.registry.get(*owner).ok_or(Error::MissingBlock)?;
            let mut node = handle.write().expect("lock poisoned");
            for block in blocks {
                if block.number >= node.chain.len() {
                    node.chain.accept_mirrored(block.clone())?;
                }
            }
        }
        if let Some(handle) = self.registry.get(proof_sender_id) {
            let mut sender_node = handle.write().expect("lock poisoned");
            sender_node.meta_knowledge.advance_from_proof(proof);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_chain::testing::InMemoryMainChain;
    use crate::registry::Node;
    use crate::{BlockAbstract, Chain as CoreChain};
    use std::sync::Arc;

    fn registered(registry: &NodeRegistry, id: NodeId) -> Arc<std::sync::RwLock<Node>> {
        registry.register(Node::new(id, [id as u8; 32], format!("node-{id}"), Block::genesis(id, None)))
    }

    #[tokio::test]
    async fn construct_returns_empty_update_when_receiver_is_current() {
        let registry = NodeRegistry::new();
        let sender = registered(&registry, 1);
        {
            let mut node = sender.write().unwrap();
            let genesis_tx = Transaction {
                number: 0,
                sender_id: None,
                receiver_id: 1,
                amount: 100,
                remainder: 0,
                sources: vec![],
                block_number: Some(0),
                signature: vec![],
            };
            node.chain = CoreChain::new(1, Block { number: 0, owner_id: 1, previous_block_hash: [0u8; 32], transactions: vec![genesis_tx] });
        }

        let main_chain = Arc::new(InMemoryMainChain::new());
        let genesis_hash = sender.read().unwrap().chain.get(0).unwrap().hash();
        main_chain.seal_height(vec![BlockAbstract { owner_id: 1, block_number: 0, block_hash: genesis_hash, signature: vec![] }]);
        let cache = AbstractCache::start(main_chain, &crate::config::Config::default()).await;

        let mut meta = MetaKnowledge::new();
        meta.advance(1, 0); // receiver already has sender's genesis.

        let tx = Transaction {
            number: 0,
            sender_id: None,
            receiver_id: 1,
            amount: 100,
            remainder: 0,
            sources: vec![],
            block_number: Some(0),
            signature: vec![],
        };

        let constructor = ProofConstructor::new(&registry);
        let proof = constructor.construct(&tx, 1, &meta, &cache).unwrap();
        assert!(proof.chain_updates.is_empty());
    }

    /// S3: the receiver already fully knows an upstream owner's chain (it
    /// previously received a proof from that owner directly) even though
    /// it's only just now learning of the immediate sender's new block.
    /// Expected, per spec.md §8: the constructed proof carries no blocks at
    /// all for the upstream owner, only the immediate sender's new block.
    #[tokio::test]
    async fn construct_omits_a_transitive_owner_the_receiver_already_knows() {
        let registry = NodeRegistry::new();
        let owner_a = registered(&registry, 1);
        let sender_b = registered(&registry, 2);
        let _receiver_c = registered(&registry, 3);

        {
            let mut node = owner_a.write().unwrap();
            let genesis_tx =
                Transaction { number: 0, sender_id: None, receiver_id: 1, amount: 100, remainder: 0, sources: vec![], block_number: Some(0), signature: vec![] };
            node.chain = CoreChain::new(1, Block { number: 0, owner_id: 1, previous_block_hash: [0u8; 32], transactions: vec![genesis_tx] });
            node.chain.append(vec![Transaction {
                number: 1,
                sender_id: Some(1),
                receiver_id: 2,
                amount: 40,
                remainder: 60,
                sources: vec![SourceRef { sender_id: None, chain_owner_id: 1, block_number: 0, number: 0 }],
                block_number: None,
                signature: vec![],
            }]);
        }
        {
            let mut node = sender_b.write().unwrap();
            node.chain.append(vec![Transaction {
                number: 1,
                sender_id: Some(2),
                receiver_id: 3,
                amount: 15,
                remainder: 25,
                sources: vec![SourceRef { sender_id: Some(1), chain_owner_id: 1, block_number: 1, number: 1 }],
                block_number: None,
                signature: vec![],
            }]);
        }

        let main_chain = Arc::new(InMemoryMainChain::new());
        let a_genesis_hash = owner_a.read().unwrap().chain.get(0).unwrap().hash();
        let a_block1_hash = owner_a.read().unwrap().chain.get(1).unwrap().hash();
        let b_block1_hash = sender_b.read().unwrap().chain.get(1).unwrap().hash();
        main_chain.seal_height(vec![BlockAbstract { owner_id: 1, block_number: 0, block_hash: a_genesis_hash, signature: vec![] }]);
        main_chain.seal_height(vec![BlockAbstract { owner_id: 1, block_number: 1, block_hash: a_block1_hash, signature: vec![] }]);
        main_chain.seal_height(vec![BlockAbstract { owner_id: 2, block_number: 1, block_hash: b_block1_hash, signature: vec![] }]);
        let cache = AbstractCache::start(main_chain, &crate::config::Config::default()).await;
        cache.update_and_wait(3).await.unwrap();

        // Receiver C already knows all of A's chain (up to block 1) but
        // nothing yet of B's beyond genesis.
        let mut meta = MetaKnowledge::new();
        meta.advance(1, 1);
        meta.advance(2, 0);

        let tx = sender_b.read().unwrap().chain.get(1).unwrap().transactions[0].clone();
        let constructor = ProofConstructor::new(&registry);
        let proof = constructor.construct(&tx, 2, &meta, &cache).unwrap();

        assert!(proof.chain_updates.get(1).is_none(), "A's already-known chain must not be re-proven");
        let b_blocks = proof.chain_updates.get(2).expect("B's new block must be proven");
        assert_eq!(b_blocks.len(), 1);
        assert_eq!(b_blocks[0].number, 1);
    }
}
