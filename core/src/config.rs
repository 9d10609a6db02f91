//! Runtime configuration for a ledger node.
//!
//! The [`Config`] struct centralises the tunables this specification
//! leaves implementation-defined: abstract-cache retry backoff, the
//! inbound worker-pool size, and the main-chain poll interval. It is
//! constructed via the [`ConfigBuilder`] fluent builder, enabling callers
//! to customise only the fields they care about while keeping sensible
//! defaults.
//!
//! All fields are `pub` so read-only access is ergonomic, however mutation
//! should occur through the builder to preserve validation invariants.
//!
//! ```
//! use obscura_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.worker_pool_size, 8);
//! ```

use serde::{Deserialize, Serialize};

/// Runtime configuration shared across a node's components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Initial delay, in seconds, between `AbstractCache` initial-update
    /// retries. The second retry uses `initial_backoff_secs * 2`, then it
    /// alternates, per spec.md §5.
    pub initial_backoff_secs: u64,

    /// Number of workers handling inbound `(transaction, proof)` messages
    /// concurrently.
    pub worker_pool_size: usize,

    /// How often, in seconds, a node polls the main chain for new height
    /// to feed `AbstractCache::note_new_height`.
    pub main_chain_poll_interval_secs: u64,

    /// Human-readable name identifying the network (e.g. "main", "test").
    pub network: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_backoff_secs: 1,
            worker_pool_size: 8,
            main_chain_poll_interval_secs: 5,
            network: "main".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn initial_backoff_secs(mut self, secs: u64) -> Self {
        self.inner.initial_backoff_secs = secs;
        self
    }

    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.inner.worker_pool_size = size;
        self
    }

    pub fn main_chain_poll_interval_secs(mut self, secs: u64) -> Self {
        self.inner.main_chain_poll_interval_secs = secs;
        self
    }

    pub fn network<S: Into<String>>(mut self, name: S) -> Self {
        self.inner.network = name.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}
