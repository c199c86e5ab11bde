//! # JSON File Store
//!
//! Persists the chain as a single pretty-printed JSON array.
//!
//! ## Atomicity
//!
//! A save writes the whole document to `<path>.tmp`, fsyncs it, then renames
//! it over `<path>`. Rename is atomic on POSIX filesystems, so a reader (or a
//! restart after a crash) sees either the old file or the new one. A leftover
//! `.tmp` from an interrupted save is simply overwritten by the next one.
//!
//! ## Non-file paths
//!
//! If the configured path exists but is not a regular file (typically a
//! directory left behind by a bad volume mount), it is removed before any
//! read or write and the store behaves as if nothing was there.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{ChainStorage, StoreError, StoreResult};
use crate::block::{Block, BlockRecord};
use crate::config::TEMP_FILE_SUFFIX;

/// File-backed [`ChainStorage`].
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// The chain document.
    path: PathBuf,
    /// Staging file for in-flight saves.
    tmp_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(TEMP_FILE_SUFFIX);
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the chain document without touching the filesystem.
    ///
    /// Unlike [`ChainStorage::load`], a non-file path is reported as
    /// [`StoreError::Corrupt`] instead of being removed.
    pub fn read_records(&self) -> StoreResult<Vec<BlockRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.location()));
            }
            Err(_) if self.path.is_dir() => {
                return Err(StoreError::Corrupt(format!(
                    "{} is not a regular file",
                    self.location()
                )));
            }
            Err(e) => return Err(StoreError::Unavailable(e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn write_tmp(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(&self.tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }
}

impl ChainStorage for JsonFileStore {
    fn load(&self) -> StoreResult<Vec<BlockRecord>> {
        remove_if_not_file(&self.path)?;
        self.read_records()
    }

    fn save(&self, blocks: &[Block]) -> StoreResult<()> {
        remove_if_not_file(&self.path)?;
        remove_if_not_file(&self.tmp_path)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let records: Vec<BlockRecord> = blocks.iter().map(Block::to_record).collect();
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if let Err(e) = self.write_tmp(&bytes) {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(e.into());
        }
        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path);

        debug!(path = %self.path.display(), blocks = blocks.len(), "chain persisted");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Remove whatever occupies `path` unless it is a regular file (or absent).
fn remove_if_not_file(path: &Path) -> StoreResult<()> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if meta.is_file() {
        return Ok(());
    }

    warn!(path = %path.display(), "chain path is not a regular file, removing it");
    let is_symlink = fs::symlink_metadata(path)?.file_type().is_symlink();
    if meta.is_dir() && !is_symlink {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Persist the rename itself. Best-effort: not every platform allows
/// opening a directory for sync.
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            debug!(dir = %parent.display(), error = %e, "directory sync skipped");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::StudentRecord;

    fn two_blocks() -> Vec<Block> {
        let genesis = Block::genesis();
        let b1 = Block::next(&genesis, StudentRecord::new("S1", "Ann", "Math", 90).into());
        vec![genesis, b1]
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn save_then_load_returns_same_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        let blocks = two_blocks();

        store.save(&blocks).unwrap();
        let records = store.load().unwrap();

        let expected: Vec<BlockRecord> = blocks.iter().map(Block::to_record).collect();
        assert_eq!(records, expected);
        assert!(!dir.path().join("chain.json.tmp").exists());
    }

    #[test]
    fn unparsable_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn record_missing_required_field_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::write(&path, br#"[{"index":0,"timestamp":1.0,"data":{"info":"genesis"}}]"#).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn directory_at_path_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::create_dir_all(path.join("nested")).unwrap();
        fs::write(path.join("nested/file"), b"x").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::NotFound(_))));
        assert!(!path.exists());

        store.save(&two_blocks()).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn read_records_leaves_directory_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::create_dir(&path).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.read_records(), Err(StoreError::Corrupt(_))));
        assert!(path.is_dir());
    }

    #[test]
    fn stale_tmp_directory_does_not_block_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.json");
        fs::create_dir(dir.path().join("chain.json.tmp")).unwrap();

        let store = JsonFileStore::new(&path);
        store.save(&two_blocks()).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/ledger/chain.json");

        let store = JsonFileStore::new(&path);
        store.save(&two_blocks()).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("chain.json"));
        let blocks = two_blocks();

        store.save(&blocks[..1]).unwrap();
        store.save(&blocks).unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn tmp_path_appends_suffix() {
        let store = JsonFileStore::new("state/chain.json");
        assert_eq!(store.tmp_path, PathBuf::from("state/chain.json.tmp"));
        assert_eq!(store.location(), "state/chain.json");
    }
}
