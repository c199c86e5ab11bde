//! # Hashing Utilities
//!
//! Block digests are SHA-256 over a canonical JSON encoding of the block's
//! content fields. "Canonical" here means:
//!
//! - object keys sorted lexicographically at every nesting level,
//! - no whitespace between tokens,
//! - strings escaped the way `serde_json` escapes them,
//! - numbers in `serde_json`'s shortest round-trip form.
//!
//! The encoder walks the value itself instead of relying on map ordering,
//! so the output does not depend on whether `serde_json`'s `preserve_order`
//! feature is enabled anywhere in the dependency graph.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data`.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 of `data`, rendered as 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_array(data))
}

/// Encode a JSON value canonically.
///
/// # Example
///
/// ```
/// use gradechain_ledger::hash::canonical_json;
///
/// let v = serde_json::json!({ "b": 1, "a": { "d": [true, null], "c": "x" } });
/// assert_eq!(canonical_json(&v), r#"{"a":{"c":"x","d":[true,null]},"b":1}"#);
/// ```
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::with_capacity(128);
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        // Null, Bool and Number already display as compact JSON.
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::from(s).to_string());
}
