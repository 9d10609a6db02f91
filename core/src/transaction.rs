//! Transaction model.
//!
//! A transaction destroys the value carried by its `sources` (prior
//! transactions owned by `sender`) and creates `amount` payable to
//! `receiver`, with `remainder` returned to `sender` as change. Coinbase /
//! mint transactions have `sender = None` and empty `sources`.

use std::hash::{Hash as StdHash, Hasher};

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A reference to a prior transaction consumed as an input.
///
/// Carries two distinct things under one type because a source's *logical*
/// identity and its *physical location* aren't the same field once mints
/// are involved:
/// - `sender_id`/`number` is the source transaction's own signing identity
///   — exactly the `(sender.id, transaction.number)` pair `canonical_bytes`
///   must encode, per spec.md §6. `None` for a genesis/mint source, which
///   has no sender.
/// - `chain_owner_id`/`block_number`/`number` locates the transaction the
///   way `spec.md` does: `owner.chain[block_number]`, then the transaction
///   within that block whose own sequence number is `number`. This is
///   *not* always `sender_id`'s chain — a genesis/mint transaction lives in
///   the minted-to node's own chain, at block 0, despite having no sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub sender_id: Option<NodeId>,
    pub chain_owner_id: NodeId,
    pub block_number: u32,
    pub number: u32,
}

/// A transfer of value between two nodes.
///
/// Equality and hashing follow `(sender_id, number)`, not structural
/// equality: two copies of the same logical transaction may differ in
/// `block_number` while still being "the same" transaction (see
/// `DESIGN.md`, identity-by-value notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique within `sender`'s chain (or within the owning chain's
    /// genesis block, for mints).
    pub number: u32,
    /// `None` for genesis/mint transactions.
    pub sender_id: Option<NodeId>,
    pub receiver_id: NodeId,
    pub amount: u64,
    pub remainder: u64,
    /// Prior transactions consumed as inputs, in insertion order. Order is
    /// significant: proof construction iterates sources in this order so
    /// that proofs are reproducible.
    pub sources: Vec<SourceRef>,
    /// Set once the transaction has been placed in a block.
    pub block_number: Option<u32>,
    /// Ed25519 signature over `canonical_bytes()`. Empty for genesis/mint
    /// transactions, which have no sender to sign with.
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Canonical byte layout for signing, fixed by spec.md §6:
    ///
    /// `sender.id (4B) ‖ receiver.id (4B) ‖ number (4B) ‖ amount (8B) ‖
    /// remainder (8B) ‖ Σ source-identifiers`, each source identifier being
    /// `sender.id (4B) ‖ transaction.number (4B)` of the *source*
    /// transaction, sources serialized in insertion order.
    ///
    /// Deviation: a `None` sender (this transaction's own, or a genesis/mint
    /// source's) is encoded as `u32::MAX` rather than omitted, so the layout
    /// stays fixed-width. Genesis transactions are never signed, so this
    /// sentinel never feeds into a real signature check.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(28 + self.sources.len() * 8);
        buf.extend_from_slice(&self.sender_id.unwrap_or(u32::MAX).to_be_bytes());
        buf.extend_from_slice(&self.receiver_id.to_be_bytes());
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(&self.amount.to_be_bytes());
        buf.extend_from_slice(&self.remainder.to_be_bytes());
        for src in &self.sources {
            buf.extend_from_slice(&src.sender_id.unwrap_or(u32::MAX).to_be_bytes());
            buf.extend_from_slice(&src.number.to_be_bytes());
        }
        buf
    }

    /// Whether this is a genesis/mint transaction (no sender, nothing to
    /// prove provenance for).
    pub fn is_genesis(&self) -> bool {
        self.sender_id.is_none()
    }

    /// The `(sender_id, number)` identity key used by sets/maps throughout
    /// the crate.
    pub fn key(&self) -> (Option<NodeId>, u32) {
        (self.sender_id, self.number)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Transaction {}

impl StdHash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_bytes_are_stable_for_identical_transactions() {
        let tx = Transaction {
            number: 1,
            sender_id: Some(1),
            receiver_id: 2,
            amount: 40,
            remainder: 60,
            sources: vec![SourceRef { sender_id: None, chain_owner_id: 1, block_number: 0, number: 0 }],
            block_number: None,
            signature: vec![],
        };
        let other = tx.clone();
        assert_eq!(tx.canonical_bytes(), other.canonical_bytes());
    }

    #[test]
    fn identity_ignores_block_number_and_signature() {
        let mut a = Transaction {
            number: 5,
            sender_id: Some(1),
            receiver_id: 2,
            amount: 1,
            remainder: 0,
            sources: vec![],
            block_number: None,
            signature: vec![],
        };
        let mut b = a.clone();
        b.block_number = Some(3);
        b.signature = vec![1, 2, 3];
        assert_eq!(a, b);
        a.number = 6;
        assert_ne!(a, b);
    }
}
