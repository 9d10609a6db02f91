//! Per-peer meta-knowledge: a ratchet tracking what a remote counterparty
//! already knows of each owner's chain.
//!
//! A `MetaKnowledge` value is attached to one particular peer (see
//! `registry::Node::meta_knowledge`): the map is keyed by *owner* id, and
//! the value is the highest block number of that owner's chain the peer is
//! believed to already hold. It is updated on send (what we just proved
//! the peer now has) and on receive (what a proof just proved the sender
//! must already have).

use std::collections::HashMap;

use crate::{Block, Chain, NodeId};
use crate::proof::Proof;

/// Default: a peer is assumed to know nothing beyond genesis.
const UNKNOWN: i64 = -1;

#[derive(Debug, Clone, Default)]
pub struct MetaKnowledge {
    known: HashMap<NodeId, i64>,
}

impl MetaKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest block number of `owner`'s chain this peer is known to hold,
    /// or `-1` if nothing beyond genesis.
    pub fn get(&self, owner: NodeId) -> i64 {
        *self.known.get(&owner).unwrap_or(&UNKNOWN)
    }

    /// `owner_chain[knownHeight+1 ..= upto_inclusive]`, or empty if the
    /// peer already knows at least that far.
    pub fn blocks_to_send(&self, owner_chain: &Chain, upto_inclusive: u32) -> Vec<Block> {
        let known_height = self.get(owner_chain.owner_id);
        if (upto_inclusive as i64) <= known_height {
            return Vec::new();
        }
        let from = (known_height + 1).max(0) as u32;
        owner_chain.slice(from, upto_inclusive)
    }

    /// Monotonically raises what this peer is known to know of `owner`'s
    /// chain.
    pub fn advance(&mut self, owner: NodeId, new_height: u32) {
        let entry = self.known.entry(owner).or_insert(UNKNOWN);
        *entry = (*entry).max(new_height as i64);
    }

    /// Advances every owner touched by `proof` to the last block number
    /// delivered for it.
    pub fn advance_from_proof(&mut self, proof: &Proof) {
        for (owner, blocks) in proof.chain_updates.iter() {
            if let Some(last) = blocks.last() {
                self.advance(*owner, last.number);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Block as CoreBlock;

    #[test]
    fn default_is_unknown() {
        let mk = MetaKnowledge::new();
        assert_eq!(mk.get(7), -1);
    }

    #[test]
    fn advance_is_monotone() {
        let mut mk = MetaKnowledge::new();
        mk.advance(1, 5);
        mk.advance(1, 3);
        assert_eq!(mk.get(1), 5);
        mk.advance(1, 9);
        assert_eq!(mk.get(1), 9);
    }

    #[test]
    fn blocks_to_send_respects_known_height() {
        let mut chain = Chain::new(1, CoreBlock::genesis(1, None));
        chain.append(vec![]);
        chain.append(vec![]);
        let mut mk = MetaKnowledge::new();
        assert_eq!(mk.blocks_to_send(&chain, 2).len(), 3);
        mk.advance(1, 1);
        assert_eq!(mk.blocks_to_send(&chain, 2).len(), 1);
        mk.advance(1, 2);
        assert!(mk.blocks_to_send(&chain, 2).is_empty());
    }
}
