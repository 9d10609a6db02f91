//! Error types for the **Obscura** scale-out ledger core.
//!
//! All high-level operations return [`crate::Result`], a convenient alias
//! for `core::result::Result<T, Error>`. The variants mirror the error
//! kinds fixed by the design: structural/semantic failures abort the
//! single transaction under validation and leave receiver state
//! untouched; [`Error::TransportError`] is transient and safe to retry.

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// `Ed25519::verify` failed against the transaction's claimed sender key.
    #[error("signature verification failed")]
    InvalidSignature,

    /// A block a proof depends on has no committed successor in the
    /// `AbstractCache`, even after a refresh to the latest main-chain height.
    #[error("block not yet finalized on the main chain")]
    NotFinalized,

    /// A proof references a block that was neither supplied in the proof
    /// nor already known locally.
    #[error("proof references a block not supplied and not already known")]
    MissingBlock,

    /// Sum of source amounts does not equal `amount + remainder`.
    #[error("conservation of value violated")]
    ConservationViolation,

    /// A source transaction has already been consumed by a prior accepted
    /// transaction at this receiver.
    #[error("double spend: source already consumed")]
    DoubleSpend,

    /// Proof construction was attempted for a transaction whose block has
    /// no committed successor yet.
    #[error("transaction's block has no committed successor")]
    NotYetCommitted,

    /// An RPC or socket operation failed. Transient; callers may retry.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Programming error: e.g. constructing a proof for a transaction that
    /// was never placed in a block.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
