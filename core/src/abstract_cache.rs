//! Asynchronous, eventually-consistent mirror of committed block-abstract
//! hashes.
//!
//! A single serial background task owns all writes to the hash set; reads
//! (`is_present`, `current_height`) are lock-free point reads that never
//! block on network I/O. `current_height` only advances after every hash
//! in the requested window has been inserted, so any reader observing a
//! given height is guaranteed every hash at or below it is present.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::main_chain::MainChainClient;
use crate::{BlockAbstract, Error, Hash, Result};

struct UpdateRequest {
    target_height: u64,
    ack: oneshot::Sender<Result<()>>,
}

/// Asynchronously maintained set of committed abstract hashes.
pub struct AbstractCache {
    set: Arc<StdRwLock<HashSet<Hash>>>,
    current_height: Arc<AtomicU64>,
    request_tx: mpsc::UnboundedSender<UpdateRequest>,
    main_chain: Arc<dyn MainChainClient>,
}

impl AbstractCache {
    /// Spawns the serial updater and blocks until the first full update
    /// against the main chain's current height succeeds (`config`'s
    /// `initial_backoff_secs`, doubled on every other retry, indefinite
    /// retries), so that subsequent `is_present` queries are meaningful.
    pub async fn start(main_chain: Arc<dyn MainChainClient>, config: &Config) -> Self {
        let set = Arc::new(StdRwLock::new(HashSet::new()));
        let current_height = Arc::new(AtomicU64::new(0));
        let (request_tx, request_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_worker(main_chain.clone(), set.clone(), current_height.clone(), request_rx));

        let cache = Self { set, current_height, request_tx, main_chain };
        cache.initial_update(config.initial_backoff_secs.max(1)).await;
        cache
    }

    async fn initial_update(&self, initial_backoff_secs: u64) {
        let base = Duration::from_secs(initial_backoff_secs);
        let mut backoff = base;
        loop {
            match self.main_chain.status().await {
                Ok(status) => match self.update_and_wait(status.latest_height).await {
                    Ok(()) => {
                        tracing::info!(height = status.latest_height, "abstract cache initial update complete");
                        return;
                    }
                    Err(error) => tracing::warn!(%error, "initial abstract cache update failed, retrying"),
                },
                Err(error) => tracing::warn!(%error, "main chain status query failed, retrying"),
            }
            tokio::time::sleep(backoff).await;
            backoff = if backoff == base { base * 2 } else { base };
        }
    }

    /// Point read: is `hash` known to be committed. Never blocks on I/O.
    pub fn is_present(&self, hash: &Hash) -> bool {
        self.set.read().expect("abstract cache lock poisoned").contains(hash)
    }

    /// Highest main-chain height fully reflected in the set so far.
    pub fn current_height(&self) -> u64 {
        self.current_height.load(Ordering::SeqCst)
    }

    /// Forwards `abstract_` to the main-chain client. On success the hash
    /// will eventually appear via the update mechanism.
    pub async fn commit(&self, abstract_: BlockAbstract) -> Result<Hash> {
        self.main_chain.commit(abstract_).await
    }

    /// Fire-and-forget request to update up to `target_height`. Use
    /// [`AbstractCache::update_and_wait`] when the caller needs to observe
    /// the result (e.g. `ProofVerifier`'s refresh-and-recheck).
    pub fn note_new_height(&self, target_height: u64) {
        let (ack, _ignored) = oneshot::channel();
        let _ = self.request_tx.send(UpdateRequest { target_height, ack });
    }

    /// Requests an update to `target_height` and awaits its outcome.
    pub async fn update_and_wait(&self, target_height: u64) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();
        self.request_tx
            .send(UpdateRequest { target_height, ack })
            .map_err(|_| Error::Internal("abstract cache worker is no longer running".into()))?;
        ack_rx
            .await
            .map_err(|_| Error::Internal("abstract cache worker dropped request".into()))?
    }

    async fn run_worker(
        main_chain: Arc<dyn MainChainClient>,
        set: Arc<StdRwLock<HashSet<Hash>>>,
        current_height: Arc<AtomicU64>,
        mut requests: mpsc::UnboundedReceiver<UpdateRequest>,
    ) {
        while let Some(request) = requests.recv().await {
            let mut height = current_height.load(Ordering::SeqCst);
            let mut outcome = Ok(());
            while height < request.target_height {
                let next = height + 1;
                match main_chain.query(next).await {
                    Ok(abstracts) => {
                        {
                            let mut guard = set.write().expect("abstract cache lock poisoned");
                            guard.extend(abstracts.into_iter().map(|a| a.block_hash));
                        }
                        height = next;
                    }
                    Err(error) => {
                        tracing::warn!(height = next, %error, "abstract cache query failed, aborting this update");
                        outcome = Err(error);
                        break;
                    }
                }
            }
            current_height.fetch_max(height, Ordering::SeqCst);
            let _ = request.ack.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_chain::testing::InMemoryMainChain;

    #[tokio::test]
    async fn starts_empty_when_main_chain_is_empty() {
        let main_chain = Arc::new(InMemoryMainChain::new());
        let cache = AbstractCache::start(main_chain, &Config::default()).await;
        assert_eq!(cache.current_height(), 0);
    }

    #[tokio::test]
    async fn update_and_wait_advances_height_and_set() {
        let main_chain = Arc::new(InMemoryMainChain::new());
        let abstract_1 = BlockAbstract { owner_id: 1, block_number: 0, block_hash: [1u8; 32], signature: vec![] };
        main_chain.seal_height(vec![abstract_1.clone()]);
        let cache = AbstractCache::start(main_chain.clone(), &Config::default()).await;
        assert_eq!(cache.current_height(), 1);
        assert!(cache.is_present(&abstract_1.block_hash));

        let abstract_2 = BlockAbstract { owner_id: 1, block_number: 1, block_hash: [2u8; 32], signature: vec![] };
        main_chain.seal_height(vec![abstract_2.clone()]);
        cache.update_and_wait(2).await.unwrap();
        assert!(cache.is_present(&abstract_2.block_hash));
        assert_eq!(cache.current_height(), 2);
    }

    #[tokio::test]
    async fn height_never_advances_past_a_failing_query() {
        let main_chain = Arc::new(InMemoryMainChain::new());
        main_chain.seal_height(vec![BlockAbstract { owner_id: 1, block_number: 0, block_hash: [1u8; 32], signature: vec![] }]);
        let cache = AbstractCache::start(main_chain, &Config::default()).await;
        // height 5 doesn't exist on the main chain yet; the request aborts
        // at the first missing height without advancing past it.
        let result = cache.update_and_wait(5).await;
        assert!(result.is_err());
        assert_eq!(cache.current_height(), 1);
    }
}
