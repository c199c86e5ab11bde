//! # Storage Module
//!
//! Durable state for the chain. The [`ChainStore`](crate::ChainStore) only
//! ever talks to the [`ChainStorage`] trait, which has two operations: load
//! the whole chain, and replace the whole chain.
//!
//! ```text
//! file.rs   — JSON file backend, write-temp-then-rename
//! memory.rs — in-process backend for tests and benchmarks
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Whole-chain rewrites.** Every save writes the full block list. Chains
//!    here are small (one block per recorded grade) and a single document is
//!    trivially atomic with a rename.
//!
//! 2. **JSON on disk.** The file is meant to be inspected and diffed by
//!    operators. It is also what the hash preimage is built from, so there is
//!    no second encoding to keep in sync.
//!
//! 3. **Distinct failure kinds.** A missing file, an unreadable file and a
//!    file that does not parse are different errors, even though the chain
//!    store currently recovers from all three the same way.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::block::{Block, BlockRecord};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or saving chain state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Nothing has been stored yet.
    #[error("no stored chain at {0}")]
    NotFound(String),

    /// Stored state exists but cannot be turned into block records.
    #[error("corrupt chain state: {0}")]
    Corrupt(String),

    /// The storage medium failed (permissions, disk full, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// ChainStorage
// ---------------------------------------------------------------------------

/// Durable backend for a chain.
///
/// Implementations must make `save` atomic: after a crash, `load` returns
/// either the previous chain or the new one, never a mix.
pub trait ChainStorage: Send + Sync {
    /// Read every stored block record, in chain order.
    fn load(&self) -> StoreResult<Vec<BlockRecord>>;

    /// Replace the stored chain with `blocks`.
    fn save(&self, blocks: &[Block]) -> StoreResult<()>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

impl<T: ChainStorage + ?Sized> ChainStorage for std::sync::Arc<T> {
    fn load(&self) -> StoreResult<Vec<BlockRecord>> {
        (**self).load()
    }

    fn save(&self, blocks: &[Block]) -> StoreResult<()> {
        (**self).save(blocks)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
