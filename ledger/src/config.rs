//! # Ledger Constants
//!
//! Fixed values that define the shape of every chain. Changing any of them
//! changes genesis hashes or the on-disk layout, so existing chain files
//! would stop validating.

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Value of the `info` field in the genesis sentinel payload.
pub const GENESIS_INFO: &str = "genesis";

/// Chain file used when no path is configured.
pub const DEFAULT_CHAIN_FILE: &str = "chain.json";

/// Suffix appended to the chain file path for the in-flight write.
pub const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Payload fields every grade entry must carry.
pub const REQUIRED_RECORD_FIELDS: [&str; 4] = ["student_id", "name", "subject", "marks"];

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LENGTH: usize = 64;
