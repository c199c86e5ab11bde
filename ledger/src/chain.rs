//! # Chain Store
//!
//! Owns the ordered block list, appends to it, answers queries against it and
//! walks it for integrity.
//!
//! ## Locking
//!
//! The block list sits behind a `parking_lot::RwLock`. [`ChainStore::add_block`]
//! holds the write guard across "build next block → push → persist", so at
//! most one append and its save are in flight and no reader ever sees a block
//! that is not yet on its way to disk. Every read takes the shared guard and
//! therefore sees a consistent snapshot.
//!
//! ## Two-phase integrity
//!
//! Loading is lenient: stored hashes are accepted as-is. Validation is
//! strict: [`validate_chain`] recomputes every hash and checks every link.
//! An invalid chain keeps being served so operators can inspect it.

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::block::{Block, BlockRecord, Payload};
use crate::config::GENESIS_PREVIOUS_HASH;
use crate::error::{LedgerError, LedgerResult};
use crate::query;
use crate::storage::{ChainStorage, StoreError};

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

/// First rule a chain breaks, as found by [`validate_chain`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("chain is empty")]
    Empty,

    #[error("genesis block has index {0}, expected 0")]
    GenesisIndex(u64),

    #[error("genesis block has previous_hash {0:?}, expected \"0\"")]
    GenesisPreviousHash(String),

    #[error("block at position {position} does not link to the block before it")]
    BrokenLink { position: usize },

    #[error("block at position {position} has a hash that does not match its content")]
    HashMismatch { position: usize },

    #[error("block at position {position} has index {found}, expected {expected}")]
    IndexGap {
        position: usize,
        found: u64,
        expected: u64,
    },
}

/// Walk `blocks` and report the first integrity violation.
///
/// Rules, checked in order with short-circuit:
///
/// 1. The chain is not empty.
/// 2. Genesis has index 0, `previous_hash == "0"` and a hash matching its
///    content.
/// 3. Every later block links to its predecessor's hash, has a hash matching
///    its content, and an index one greater than its predecessor's.
pub fn validate_chain(blocks: &[Block]) -> Result<(), IntegrityError> {
    let genesis = blocks.first().ok_or(IntegrityError::Empty)?;
    if genesis.index() != 0 {
        return Err(IntegrityError::GenesisIndex(genesis.index()));
    }
    if genesis.previous_hash() != GENESIS_PREVIOUS_HASH {
        return Err(IntegrityError::GenesisPreviousHash(
            genesis.previous_hash().to_string(),
        ));
    }
    if !genesis.hash_is_consistent() {
        return Err(IntegrityError::HashMismatch { position: 0 });
    }

    for (offset, pair) in blocks.windows(2).enumerate() {
        let (prev, current) = (&pair[0], &pair[1]);
        let position = offset + 1;

        if current.previous_hash() != prev.hash() {
            return Err(IntegrityError::BrokenLink { position });
        }
        if !current.hash_is_consistent() {
            return Err(IntegrityError::HashMismatch { position });
        }
        match prev.index().checked_add(1) {
            Some(expected) if expected == current.index() => {}
            expected => {
                return Err(IntegrityError::IndexGap {
                    position,
                    found: current.index(),
                    expected: expected.unwrap_or(u64::MAX),
                });
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// ChainStore
// ---------------------------------------------------------------------------

/// The single owner of the chain.
///
/// Construct once with [`ChainStore::open`] and share behind an `Arc`.
/// Callers only ever receive clones of blocks.
pub struct ChainStore {
    blocks: RwLock<Vec<Block>>,
    storage: Box<dyn ChainStorage>,
}

impl ChainStore {
    /// Load the chain from `storage`, or start a fresh one.
    ///
    /// Never fails. A missing, unreadable, unparsable or empty store is
    /// replaced by a chain holding only a new genesis block, which is saved
    /// immediately.
    pub fn open<S: ChainStorage + 'static>(storage: S) -> Self {
        let location = storage.location();
        let loaded = match storage.load() {
            Ok(records) if records.is_empty() => {
                warn!(%location, "stored chain has no blocks, creating genesis block");
                None
            }
            Ok(records) => Some(rebuild(records)),
            Err(StoreError::NotFound(_)) => {
                info!(%location, "no stored chain, creating genesis block");
                None
            }
            Err(e) => {
                warn!(%location, error = %e, "failed to load chain, creating genesis block");
                None
            }
        };

        let store = Self {
            blocks: RwLock::new(Vec::new()),
            storage: Box::new(storage),
        };

        match loaded {
            Some(blocks) => {
                info!(%location, blocks = blocks.len(), "chain loaded");
                *store.blocks.write() = blocks;
            }
            None => {
                let mut blocks = store.blocks.write();
                blocks.push(Block::genesis());
                store.persist(&blocks);
            }
        }
        store
    }

    /// The most recently appended block.
    pub fn last_block(&self) -> LedgerResult<Block> {
        self.blocks.read().last().cloned().ok_or(LedgerError::EmptyChain)
    }

    /// Append a block carrying `data` and persist the whole chain.
    ///
    /// A failed save is logged and the block stays in memory; the next
    /// successful save writes it out.
    pub fn add_block(&self, data: impl Into<Payload>) -> LedgerResult<Block> {
        let mut blocks = self.blocks.write();
        let parent = blocks.last().ok_or(LedgerError::EmptyChain)?;
        let block = Block::next(parent, data.into());
        blocks.push(block.clone());
        self.persist(&blocks);
        Ok(block)
    }

    /// Plain records for every block, in chain order.
    pub fn to_list(&self) -> Vec<BlockRecord> {
        query::list(&self.blocks.read())
    }

    /// Payloads recorded for `student_id`, in chain order.
    pub fn get_records_by_student(&self, student_id: &str) -> Vec<Payload> {
        let blocks = self.blocks.read();
        query::records_for_student(&blocks, student_id)
            .cloned()
            .collect()
    }

    /// The block at position `index`.
    pub fn get_block(&self, index: u64) -> LedgerResult<Block> {
        query::block_at(&self.blocks.read(), index).cloned()
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Full integrity walk. See [`validate_chain`].
    pub fn validate(&self) -> Result<(), IntegrityError> {
        validate_chain(&self.blocks.read())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Where the chain is persisted.
    pub fn location(&self) -> String {
        self.storage.location()
    }

    fn persist(&self, blocks: &[Block]) {
        if let Err(e) = self.storage.save(blocks) {
            error!(
                location = %self.storage.location(),
                blocks = blocks.len(),
                error = %e,
                "persist failed, continuing with in-memory chain"
            );
        }
    }
}

fn rebuild(records: Vec<BlockRecord>) -> Vec<Block> {
    records.into_iter().map(Block::from_record).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
