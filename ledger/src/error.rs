//! Error types for chain operations.
//!
//! Storage failures have their own type ([`StoreError`](crate::StoreError))
//! because the chain store recovers from them locally and never hands them
//! to callers. `LedgerError` is what escapes.

/// Errors returned by [`ChainStore`](crate::ChainStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The chain has no blocks. Genesis is created on open, so this means an
    /// internal invariant was broken.
    #[error("chain is empty")]
    EmptyChain,

    #[error("block not found at index {0}")]
    BlockNotFound(u64),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
