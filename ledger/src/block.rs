//! # Block Structure
//!
//! A block is one grade entry plus the linkage that makes history
//! tamper-evident.
//!
//! ## Block Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  index: u64           (position, genesis = 0)│
//! │  timestamp: f64       (Unix seconds)         │
//! │  data: Payload        (grade entry / sentinel)│
//! │  previous_hash: String                       │
//! │  hash: String         (SHA-256, hex)         │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Hash Computation
//!
//! The hash covers `index`, `timestamp`, `data` and `previous_hash`, encoded
//! as canonical JSON (see [`crate::hash`]). The stored `hash` is not part of
//! its own preimage.
//!
//! Blocks built in-process are sealed at construction, so their hash always
//! matches their content. Blocks rebuilt from storage keep whatever hash the
//! record carried; only [`crate::chain::validate_chain`] decides whether it
//! is honest.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{GENESIS_INFO, GENESIS_PREVIOUS_HASH};
use crate::hash::{canonical_json, sha256_hex};

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Sentinel payload carried by the genesis block: `{"info": "genesis"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisPayload {
    pub info: String,
}

impl Default for GenesisPayload {
    fn default() -> Self {
        Self {
            info: GENESIS_INFO.to_string(),
        }
    }
}

/// One recorded grade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudentRecord {
    pub student_id: String,
    pub name: String,
    pub subject: String,
    pub marks: i64,
}

impl StudentRecord {
    pub fn new(
        student_id: impl Into<String>,
        name: impl Into<String>,
        subject: impl Into<String>,
        marks: i64,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            subject: subject.into(),
            marks,
        }
    }
}

/// The content of a block.
///
/// Variants are tried in order when decoding. Both typed variants reject
/// unknown fields, so a stored payload with any extra or differently typed
/// field lands in `Opaque` and is kept byte-for-byte equivalent. That matters:
/// dropping a field on load would change the block's hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Genesis(GenesisPayload),
    Grade(StudentRecord),
    Opaque(Value),
}

impl Payload {
    /// The `student_id` this payload belongs to, if any.
    ///
    /// Genesis payloads never have one. Opaque payloads match only when they
    /// are objects with a string `student_id`.
    pub fn student_id(&self) -> Option<&str> {
        match self {
            Payload::Genesis(_) => None,
            Payload::Grade(record) => Some(&record.student_id),
            Payload::Opaque(value) => value.get("student_id").and_then(Value::as_str),
        }
    }

    /// The grade entry, when this payload is one.
    pub fn as_record(&self) -> Option<&StudentRecord> {
        match self {
            Payload::Grade(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_genesis(&self) -> bool {
        matches!(self, Payload::Genesis(_))
    }

    /// JSON form used both for hashing and for API output.
    pub fn to_value(&self) -> Value {
        match self {
            Payload::Genesis(g) => json!({ "info": g.info }),
            Payload::Grade(r) => json!({
                "student_id": r.student_id,
                "name": r.name,
                "subject": r.subject,
                "marks": r.marks,
            }),
            Payload::Opaque(v) => v.clone(),
        }
    }
}

impl From<StudentRecord> for Payload {
    fn from(record: StudentRecord) -> Self {
        Payload::Grade(record)
    }
}

impl From<GenesisPayload> for Payload {
    fn from(genesis: GenesisPayload) -> Self {
        Payload::Genesis(genesis)
    }
}

// ---------------------------------------------------------------------------
// BlockRecord
// ---------------------------------------------------------------------------

/// Plain serializable form of a block, as persisted and as returned by the
/// API.
///
/// `hash` is optional on input so that older or hand-written chain files
/// without it still load; it is always present on output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: f64,
    pub data: Payload,
    pub previous_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// An immutable ledger entry.
///
/// Fields are private: the only ways to obtain a `Block` are sealing new
/// content ([`Block::new`], [`Block::genesis`], [`Block::next`]) or
/// rebuilding one from a stored record ([`Block::from_record`]).
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    index: u64,
    timestamp: f64,
    data: Payload,
    previous_hash: String,
    hash: String,
}

impl Block {
    /// Build and seal a block from its content fields.
    pub fn new(index: u64, timestamp: f64, data: Payload, previous_hash: impl Into<String>) -> Self {
        let previous_hash = previous_hash.into();
        let hash = compute_block_hash(index, timestamp, &data, &previous_hash);
        Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
        }
    }

    /// Construct the genesis block, stamped with the current time.
    pub fn genesis() -> Self {
        Self::new(
            0,
            now_timestamp(),
            Payload::Genesis(GenesisPayload::default()),
            GENESIS_PREVIOUS_HASH,
        )
    }

    /// Construct the block that extends `parent` with `data`.
    pub fn next(parent: &Block, data: Payload) -> Self {
        // A parent at u64::MAX can only come from a doctored file; the
        // duplicate index this produces is reported by validation.
        let index = parent.index.saturating_add(1);
        Self::new(index, now_timestamp(), data, parent.hash.clone())
    }

    /// Rebuild a block from storage.
    ///
    /// A missing hash is computed from content. A present hash is kept even
    /// if it does not match; validation reports that later.
    pub fn from_record(record: BlockRecord) -> Self {
        let hash = match record.hash {
            Some(hash) => hash,
            None => compute_block_hash(
                record.index,
                record.timestamp,
                &record.data,
                &record.previous_hash,
            ),
        };
        Self {
            index: record.index,
            timestamp: record.timestamp,
            data: record.data,
            previous_hash: record.previous_hash,
            hash,
        }
    }

    /// Plain representation including the stored hash.
    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            timestamp: self.timestamp,
            data: self.data.clone(),
            previous_hash: self.previous_hash.clone(),
            hash: Some(self.hash.clone()),
        }
    }

    /// Recompute the digest from the content fields.
    pub fn compute_hash(&self) -> String {
        compute_block_hash(self.index, self.timestamp, &self.data, &self.previous_hash)
    }

    /// Whether the stored hash matches the content.
    pub fn hash_is_consistent(&self) -> bool {
        self.hash == self.compute_hash()
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn data(&self) -> &Payload {
        &self.data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

// ---------------------------------------------------------------------------
// Hash Computation
// ---------------------------------------------------------------------------

/// SHA-256 over the canonical JSON of `{data, index, previous_hash, timestamp}`.
fn compute_block_hash(index: u64, timestamp: f64, data: &Payload, previous_hash: &str) -> String {
    let preimage = json!({
        "index": index,
        "timestamp": timestamp,
        "data": data.to_value(),
        "previous_hash": previous_hash,
    });
    sha256_hex(canonical_json(&preimage).as_bytes())
}

/// Current wall-clock time as fractional Unix seconds (microsecond precision).
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HASH_HEX_LENGTH;

    fn ann_math() -> Payload {
        StudentRecord::new("S1", "Ann", "Math", 90).into()
    }

    #[test]
    fn genesis_block_properties() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.previous_hash(), "0");
        assert_eq!(genesis.data(), &Payload::Genesis(GenesisPayload::default()));
        assert_eq!(genesis.data().to_value(), json!({ "info": "genesis" }));
        assert!(genesis.hash_is_consistent());
    }

    #[test]
    fn hash_is_deterministic() {
        let a = Block::new(3, 1_700_000_000.5, ann_math(), "abc");
        let b = Block::new(3, 1_700_000_000.5, ann_math(), "abc");
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), HASH_HEX_LENGTH);
        assert!(a.hash().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_covers_every_content_field() {
        let base = Block::new(1, 10.0, ann_math(), "p");
        let variants = [
            Block::new(2, 10.0, ann_math(), "p"),
            Block::new(1, 10.5, ann_math(), "p"),
            Block::new(1, 10.0, StudentRecord::new("S1", "Ann", "Math", 91).into(), "p"),
            Block::new(1, 10.0, ann_math(), "q"),
        ];
        for v in &variants {
            assert_ne!(base.hash(), v.hash());
        }
    }

    #[test]
    fn next_block_links_to_parent() {
        let genesis = Block::genesis();
        let block1 = Block::next(&genesis, ann_math());

        assert_eq!(block1.index(), 1);
        assert_eq!(block1.previous_hash(), genesis.hash());
        assert!(block1.timestamp() >= genesis.timestamp());
        assert!(block1.hash_is_consistent());
    }

    #[test]
    fn record_without_hash_gets_computed_hash() {
        let sealed = Block::new(1, 42.0, ann_math(), "p");
        let mut record = sealed.to_record();
        record.hash = None;

        let rebuilt = Block::from_record(record);
        assert_eq!(rebuilt.hash(), sealed.hash());
    }

    #[test]
    fn record_with_wrong_hash_is_kept_as_is() {
        let mut record = Block::new(1, 42.0, ann_math(), "p").to_record();
        record.hash = Some("f".repeat(64));

        let rebuilt = Block::from_record(record);
        assert_eq!(rebuilt.hash(), "f".repeat(64));
        assert!(!rebuilt.hash_is_consistent());
    }

    #[test]
    fn payload_decoding_picks_the_right_variant() {
        let genesis: Payload = serde_json::from_value(json!({ "info": "genesis" })).unwrap();
        assert!(genesis.is_genesis());

        let grade: Payload = serde_json::from_value(json!({
            "student_id": "S1", "name": "Ann", "subject": "Math", "marks": 90
        }))
        .unwrap();
        assert_eq!(grade.as_record().map(|r| r.marks), Some(90));

        // Extra field: must not be silently dropped.
        let extra: Payload = serde_json::from_value(json!({
            "student_id": "S1", "name": "Ann", "subject": "Math", "marks": 90, "term": "T1"
        }))
        .unwrap();
        assert!(matches!(extra, Payload::Opaque(_)));
        assert_eq!(extra.student_id(), Some("S1"));
        assert_eq!(extra.to_value()["term"], "T1");
    }

    #[test]
    fn opaque_payload_hash_survives_round_trip() {
        let data = Payload::Opaque(json!({ "student_id": 7, "note": { "b": 1, "a": 2 } }));
        let block = Block::new(1, 5.25, data, "p");

        let json = serde_json::to_string(&block.to_record()).unwrap();
        let record: BlockRecord = serde_json::from_str(&json).unwrap();
        let rebuilt = Block::from_record(record);

        assert_eq!(rebuilt, block);
        assert!(rebuilt.hash_is_consistent());
        // Non-string ids never match a student lookup.
        assert_eq!(rebuilt.data().student_id(), None);
    }

    #[test]
    fn record_serializes_all_fields() {
        let block = Block::new(1, 1.5, ann_math(), "p");
        let value = serde_json::to_value(block.to_record()).unwrap();
        assert_eq!(value["index"], 1);
        assert_eq!(value["timestamp"], 1.5);
        assert_eq!(value["data"]["name"], "Ann");
        assert_eq!(value["previous_hash"], "p");
        assert_eq!(value["hash"], block.hash());
    }
}
