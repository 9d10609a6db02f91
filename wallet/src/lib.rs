//! Key generation and node-identity bootstrap.
//!
//! A wallet is an Ed25519 keypair plus the metadata (node id, network
//! address) needed to turn it into an `obscura_core::Node`: generate one,
//! persist it to disk, and load it back on the next run so a node keeps
//! the same identity across restarts.

use std::fs;
use std::path::Path;

use obscura_core::crypto::{self, PublicKeyBytes, SecretSeed};
use obscura_core::{Block, Node, NodeId, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("identity file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity file is corrupt: {0}")]
    Decode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;

/// A node's persistent identity: its keypair plus the address and id it
/// presents to peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub node_id: NodeId,
    pub address: String,
    pub public_key: PublicKeyBytes,
    secret_seed: SecretSeed,
}

impl Identity {
    /// Generates a fresh keypair for `node_id` at `address`.
    pub fn generate(node_id: NodeId, address: impl Into<String>) -> Self {
        let (secret_seed, public_key) = crypto::generate();
        Self { node_id, address: address.into(), public_key, secret_seed }
    }

    pub fn public_key(&self) -> &PublicKeyBytes {
        &self.public_key
    }

    /// Signs `msg` with this identity's own key.
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        crypto::sign(msg, &self.secret_seed)
    }

    /// Writes this identity to `path` (`bincode`-encoded). Callers are
    /// responsible for restricting the file's permissions; this crate does
    /// not manage a keystore.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = bincode::serialize(self).expect("Identity always serializes");
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Reads an identity previously written by [`Identity::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Loads the identity at `path` if it exists, otherwise generates and
    /// persists a fresh one — the usual node-startup path.
    pub fn load_or_generate(path: impl AsRef<Path>, node_id: NodeId, address: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let identity = Self::generate(node_id, address);
            identity.save(path)?;
            Ok(identity)
        }
    }

    /// This identity's genesis block: a single mint transaction paying
    /// `initial_supply` to itself, or an empty genesis if `None`.
    pub fn genesis_block(&self, initial_supply: Option<u64>) -> Block {
        let mint = initial_supply.map(|amount| Transaction {
            number: 0,
            sender_id: None,
            receiver_id: self.node_id,
            amount,
            remainder: 0,
            sources: vec![],
            block_number: Some(0),
            signature: vec![],
        });
        Block::genesis(self.node_id, mint)
    }

    /// Builds the `obscura_core::Node` this identity represents, ready for
    /// registration with a `NodeRegistry` as the local node.
    pub fn into_node(self, initial_supply: Option<u64>) -> Node {
        let genesis = self.genesis_block(initial_supply);
        Node::new(self.node_id, self.public_key, self.address.clone(), genesis).with_secret_key(self.secret_seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_can_sign_and_be_verified() {
        let identity = Identity::generate(1, "127.0.0.1:9000");
        let sig = identity.sign(b"hello");
        assert!(crypto::verify(b"hello", &sig, identity.public_key()));
    }

    #[test]
    fn save_and_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        let identity = Identity::generate(7, "10.0.0.1:9000");
        identity.save(&path).unwrap();
        let loaded = Identity::load(&path).unwrap();
        assert_eq!(identity.node_id, loaded.node_id);
        assert_eq!(identity.public_key, loaded.public_key);
        assert_eq!(identity.sign(b"x"), loaded.sign(b"x"));
    }

    #[test]
    fn load_or_generate_creates_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        let first = Identity::load_or_generate(&path, 3, "addr").unwrap();
        let second = Identity::load_or_generate(&path, 3, "addr").unwrap();
        assert_eq!(first.public_key, second.public_key);
    }

    #[test]
    fn genesis_block_mints_initial_supply() {
        let identity = Identity::generate(1, "addr");
        let block = identity.genesis_block(Some(100));
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].amount, 100);
        assert_eq!(block.transactions[0].receiver_id, 1);
    }
}
