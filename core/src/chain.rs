//! Per-node linear chain of blocks.
//!
//! Position 0 of every chain is the **genesis block**: a shared reference,
//! identical bit-for-bit across all nodes. Blocks are appended by their
//! owner only and never mutated afterwards.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Hash, NodeId, Transaction};

/// A node's append-only sequence of blocks. `blocks[i].number == i`.
#[derive(Debug, Clone)]
pub struct Chain {
    pub owner_id: NodeId,
    blocks: Vec<Block>,
}

impl Chain {
    /// Starts a chain from a genesis block. `genesis.number` must be 0 and
    /// `genesis.owner_id` must equal `owner_id`.
    pub fn new(owner_id: NodeId, genesis: Block) -> Self {
        debug_assert_eq!(genesis.number, 0);
        debug_assert_eq!(genesis.owner_id, owner_id);
        Self { owner_id, blocks: vec![genesis] }
    }

    /// Appends a new block made of `transactions`, with `number` and
    /// `previous_block_hash` derived from the current tip. Returns the
    /// newly appended block.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> &Block {
        let number = self.blocks.len() as u32;
        let previous_block_hash = self.tip().hash();
        let mut stamped = transactions;
        for tx in &mut stamped {
            tx.block_number = Some(number);
        }
        self.blocks.push(Block { number, owner_id: self.owner_id, previous_block_hash, transactions: stamped });
        self.blocks.last().expect("just pushed")
    }

    /// The highest-numbered block, i.e. the chain tip.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always has a genesis block")
    }

    pub fn tip_number(&self) -> u32 {
        self.tip().number
    }

    pub fn get(&self, number: u32) -> Option<&Block> {
        self.blocks.get(number as usize)
    }

    pub fn len(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        false // a chain always has a genesis block
    }

    /// Blocks in `[from_inclusive, upto_inclusive]`, or empty if the range
    /// is out of bounds or inverted.
    pub fn slice(&self, from_inclusive: u32, upto_inclusive: u32) -> Vec<Block> {
        if from_inclusive > upto_inclusive {
            return Vec::new();
        }
        let end = (upto_inclusive as usize + 1).min(self.blocks.len());
        let start = (from_inclusive as usize).min(end);
        self.blocks[start..end].to_vec()
    }

    /// Appends a block received via a proof, provided it extends the chain
    /// by exactly one and links correctly. Returns `Ok(())` if the block
    /// was new, `Ok(())` if an identical block already occupied that slot,
    /// and `Err` if a block already at that position differs (a fork the
    /// local mirror cannot reconcile) or the block does not extend the tip.
    pub fn accept_mirrored(&mut self, block: Block) -> Result<(), crate::Error> {
        if block.number < self.len() {
            let existing = self.get(block.number).expect("in bounds");
            return if existing.hash() == block.hash() {
                Ok(())
            } else {
                Err(crate::Error::Internal(format!(
                    "mirrored block {} for node {} conflicts with previously known block",
                    block.number, self.owner_id
                )))
            };
        }
        if block.number != self.len() {
            return Err(crate::Error::MissingBlock);
        }
        if block.previous_block_hash != self.tip().hash() {
            return Err(crate::Error::Internal(format!(
                "mirrored block {} for node {} does not link to known tip",
                block.number, self.owner_id
            )));
        }
        self.blocks.push(block);
        Ok(())
    }
}

/// A container for an ordered set of transactions, linked into its owner's
/// chain by `previous_block_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub number: u32,
    pub owner_id: NodeId,
    pub previous_block_hash: Hash,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// `SHA-256(owner_id ‖ number ‖ previous_block_hash ‖ Σ transaction-hashes)`.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.owner_id.to_be_bytes());
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.previous_block_hash);
        for tx in &self.transactions {
            hasher.update(tx.canonical_bytes());
        }
        let digest = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        hash
    }

    /// Genesis block for `owner_id`: number 0, all-zero previous hash, no
    /// transactions unless `mint` is supplied as the sole entry.
    pub fn genesis(owner_id: NodeId, mint: Option<Transaction>) -> Self {
        Self {
            number: 0,
            owner_id,
            previous_block_hash: [0u8; 32],
            transactions: mint.into_iter().collect(),
        }
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id && self.number == other.number
    }
}
impl Eq for Block {}

/// The value committed to the main chain as a finality witness for one
/// block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAbstract {
    pub owner_id: NodeId,
    pub block_number: u32,
    pub block_hash: Hash,
    pub signature: Vec<u8>,
}

impl BlockAbstract {
    /// `owner_id (4B) ‖ block_number (4B) ‖ block_hash (32B)` — the signed
    /// payload, i.e. the Glossary's `Abstract = (ownerId, blockNumber,
    /// blockHash)` tuple, before a signature is attached.
    pub fn signing_bytes(owner_id: NodeId, block_number: u32, block_hash: Hash) -> Vec<u8> {
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(&owner_id.to_be_bytes());
        buf.extend_from_slice(&block_number.to_be_bytes());
        buf.extend_from_slice(&block_hash);
        buf
    }

    /// `signing_bytes(owner_id, block_number, block_hash) ‖ signature`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Self::signing_bytes(self.owner_id, self.block_number, self.block_hash);
        buf.extend_from_slice(&self.signature);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_is_stable() {
        let g1 = Block::genesis(1, None);
        let g2 = Block::genesis(1, None);
        assert_eq!(g1.hash(), g2.hash());
    }

    #[test]
    fn append_links_previous_hash() {
        let mut chain = Chain::new(1, Block::genesis(1, None));
        chain.append(vec![]);
        assert_eq!(chain.tip_number(), 1);
        assert_eq!(chain.get(1).unwrap().previous_block_hash, chain.get(0).unwrap().hash());
    }

    #[test]
    fn slice_respects_bounds() {
        let mut chain = Chain::new(1, Block::genesis(1, None));
        chain.append(vec![]);
        chain.append(vec![]);
        assert_eq!(chain.slice(1, 2).len(), 2);
        assert!(chain.slice(5, 2).is_empty());
        assert_eq!(chain.slice(0, 100).len(), 3);
    }

    #[test]
    fn accept_mirrored_rejects_conflicting_block() {
        let mut chain = Chain::new(1, Block::genesis(1, None));
        let real = chain.append(vec![]).clone();
        let mut forked = real.clone();
        forked.previous_block_hash = [9u8; 32];
        let mut mirror = Chain::new(1, Block::genesis(1, None));
        mirror.accept_mirrored(real).unwrap();
        assert!(mirror.accept_mirrored(forked).is_err());
    }
}
