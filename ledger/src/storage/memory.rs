//! In-process [`ChainStorage`] with no filesystem side effects.
//!
//! Ideal for unit tests and benchmarks. Saves replace the held records
//! wholesale, which is as atomic as the file backend's rename.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{ChainStorage, StoreError, StoreResult};
use crate::block::{Block, BlockRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Option<Vec<BlockRecord>>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    /// An empty store: the first `load` reports `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `records`.
    pub fn with_records(records: Vec<BlockRecord>) -> Self {
        Self {
            records: Mutex::new(Some(records)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Snapshot of what is currently stored.
    pub fn records(&self) -> Option<Vec<BlockRecord>> {
        self.records.lock().clone()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl ChainStorage for MemoryStore {
    fn load(&self) -> StoreResult<Vec<BlockRecord>> {
        self.records
            .lock()
            .clone()
            .ok_or_else(|| StoreError::NotFound(self.location()))
    }

    fn save(&self, blocks: &[Block]) -> StoreResult<()> {
        *self.records.lock() = Some(blocks.iter().map(Block::to_record).collect());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn save_replaces_records() {
        let store = MemoryStore::new();
        let genesis = Block::genesis();

        store.save(std::slice::from_ref(&genesis)).unwrap();
        assert_eq!(store.load().unwrap(), vec![genesis.to_record()]);
        assert_eq!(store.save_count(), 1);
    }
}
