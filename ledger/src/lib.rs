// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # GradeChain Ledger — Core Library
//!
//! A single-node, append-only ledger of student grade entries. Every entry
//! lives in a block that commits to its predecessor's hash, so any edit to
//! history is detectable by walking the chain.
//!
//! This is a tamper-evident log, not a distributed blockchain: there is no
//! consensus, no mining, no peers and no signatures. What it does have is a
//! strict integrity walk and crash-safe persistence.
//!
//! ## Architecture
//!
//! - **block** — Block structure, payload union, sealing and hash recomputation.
//! - **hash** — Canonical JSON encoding and SHA-256 digests.
//! - **chain** — The [`ChainStore`]: append, lookup, validation, load fallback.
//! - **query** — Read-only views over a block slice.
//! - **storage** — The [`ChainStorage`] seam and its JSON file / memory backends.
//! - **error** — Error types shared across the crate.
//! - **config** — Ledger constants.
//!
//! ## Data Flow
//!
//! ```text
//! caller ──add_block──▶ ChainStore ──seal──▶ Block ──sha256──▶ hash
//!                           │
//!                           └──save──▶ ChainStorage (tmp file + rename)
//! ```

pub mod block;
pub mod chain;
pub mod config;
pub mod error;
pub mod hash;
pub mod query;
pub mod storage;

pub use block::{Block, BlockRecord, GenesisPayload, Payload, StudentRecord};
pub use chain::{validate_chain, ChainStore, IntegrityError};
pub use error::{LedgerError, LedgerResult};
pub use storage::{ChainStorage, JsonFileStore, MemoryStore, StoreError, StoreResult};
