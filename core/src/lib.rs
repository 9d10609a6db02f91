//! Obscura scale-out ledger core.
//!
//! Each participant keeps a private linear [`Chain`] of [`Block`]s. Value
//! transfers ([`Transaction`]) carry a [`proof::Proof`]: a minimal,
//! verifiable slice of the sender's (and, recursively, its sources'
//! owners') chains, pruned by what the receiver already knows
//! ([`MetaKnowledge`]). Periodically, blocks are committed as abstracts to
//! a shared BFT main chain (the [`main_chain::MainChainClient`]
//! interface); an [`AbstractCache`] mirrors which abstracts have landed so
//! receivers can decide whether a claimed block is finalized.

pub mod abstract_cache;
pub mod chain;
pub mod communication;
pub mod config;
pub mod crypto;
pub mod error;
pub mod local_store;
pub mod main_chain;
pub mod meta_knowledge;
pub mod proof;
pub mod registry;
pub mod transaction;

pub use abstract_cache::AbstractCache;
pub use chain::{Block, BlockAbstract, Chain};
pub use communication::CommunicationHelper;
pub use config::Config;
pub use error::{Error, Result};
pub use local_store::LocalStore;
pub use main_chain::{MainChainClient, MainChainStatus};
pub use meta_knowledge::MetaKnowledge;
pub use proof::{Proof, ProofConstructor, ProofVerifier};
pub use registry::{Node, NodeLookup, NodeRegistry};
pub use transaction::{SourceRef, Transaction};

/// 256-bit digest identifying a block or an abstract.
pub type Hash = [u8; 32];

/// A participant's identity. See `DESIGN.md`: nodes are referenced by id
/// everywhere (never by direct reference) to break the `Node` ↔ `Chain` ↔
/// `Block` ↔ `Transaction` cycle.
pub type NodeId = u32;
