//! The main-chain client interface.
//!
//! The concrete BFT main chain is out of scope for this crate (see
//! `spec.md` §1); this module fixes the three operations the rest of the
//! system needs from it, plus an in-memory test double used throughout
//! this crate's own tests and available to downstream crates for theirs.

use async_trait::async_trait;

use crate::{BlockAbstract, Error, Hash, Result};

/// Current height of the main chain, as reported by `status()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainChainStatus {
    pub latest_height: u64,
}

/// Operations this crate requires from the shared BFT main chain.
///
/// Implementations live outside this crate (see `obscura-rpc` for a
/// `jsonrpsee`-based one); this trait is the seam `AbstractCache` and
/// `LocalStore` are built against.
#[async_trait]
pub trait MainChainClient: Send + Sync {
    /// Current height of the main chain.
    async fn status(&self) -> Result<MainChainStatus>;

    /// All abstracts committed at `height`. An empty result means no
    /// abstract landed at that height, not an error.
    async fn query(&self, height: u64) -> Result<Vec<BlockAbstract>>;

    /// Submits `abstract_` for inclusion. Returns the block hash it
    /// commits on success. Submission is at-least-once: callers retry a
    /// failed commit at their next send opportunity, and the main chain
    /// is expected to provide idempotence by hash.
    async fn commit(&self, abstract_: BlockAbstract) -> Result<Hash>;
}

/// An in-memory main chain used by this crate's tests and available to
/// integration tests in other crates of this workspace.
pub mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct InMemoryMainChain {
        heights: Mutex<Vec<Vec<BlockAbstract>>>,
    }

    impl InMemoryMainChain {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commits `abstracts` as a brand new height, simulating BFT
        /// ordering finalizing a batch. Returns the new height.
        pub fn seal_height(&self, abstracts: Vec<BlockAbstract>) -> u64 {
            let mut heights = self.heights.lock().expect("lock poisoned");
            heights.push(abstracts);
            heights.len() as u64
        }
    }

    #[async_trait]
    impl MainChainClient for InMemoryMainChain {
        async fn status(&self) -> Result<MainChainStatus> {
            let heights = self.heights.lock().expect("lock poisoned");
            Ok(MainChainStatus { latest_height: heights.len() as u64 })
        }

        async fn query(&self, height: u64) -> Result<Vec<BlockAbstract>> {
            if height == 0 {
                return Ok(Vec::new());
            }
            let heights = self.heights.lock().expect("lock poisoned");
            heights
                .get(height as usize - 1)
                .cloned()
                .ok_or_else(|| Error::TransportError(format!("no such height {height}")))
        }

        async fn commit(&self, abstract_: BlockAbstract) -> Result<Hash> {
            let hash = abstract_.block_hash;
            self.seal_height(vec![abstract_]);
            Ok(hash)
        }
    }
}
