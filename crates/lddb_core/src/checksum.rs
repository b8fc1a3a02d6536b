//! Content fingerprinting for deduplicated versioning.
//!
//! # Responsibility
//! - Remove store-owned fields from incoming documents.
//! - Produce a deterministic fingerprint of the remaining content.
//!
//! # Invariants
//! - The fingerprint depends on content only: object keys are sorted at every
//!   depth and encoding is compact, so insertion order never matters.
//! - Output is always 64 lowercase hex characters.

use crate::model::record::Document;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Top-level document keys owned by the store.
pub const STORE_OWNED_KEYS: [&str; 4] = ["created", "modified", "checksum", "deleted"];

/// Removes store-owned keys from the top level of `data`.
///
/// Non-object documents are left untouched.
pub fn strip_store_fields(data: &mut Document) {
    if let Value::Object(map) = data {
        for key in STORE_OWNED_KEYS {
            map.remove(key);
        }
    }
}

/// Computes the content fingerprint of `data`.
pub fn checksum(data: &Document) -> Result<String, serde_json::Error> {
    let bytes = canonical_bytes(data)?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    Ok(hex)
}

/// Serializes `value` as compact JSON with recursively sorted object keys.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    write_canonical(&mut out, value)?;
    Ok(out)
}

fn write_canonical(out: &mut Vec<u8>, value: &Value) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            push(out, b"{")?;
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    push(out, b",")?;
                }
                serde_json::to_writer(&mut *out, key)?;
                push(out, b":")?;
                write_canonical(out, item)?;
            }
            push(out, b"}")
        }
        Value::Array(items) => {
            push(out, b"[")?;
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    push(out, b",")?;
                }
                write_canonical(out, item)?;
            }
            push(out, b"]")
        }
        scalar => serde_json::to_writer(&mut *out, scalar),
    }
}

fn push(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), serde_json::Error> {
    out.write_all(bytes).map_err(serde_json::Error::io)
}

#[cfg(test)]
mod tests {
    use super::{canonical_bytes, checksum, strip_store_fields};
    use serde_json::{json, Map, Value};

    #[test]
    fn checksum_is_stable_and_fixed_length() {
        let doc = json!({"title": "A", "descriptions": {"entry": {"@id": "/w/1"}}});
        let first = checksum(&doc).unwrap();
        let second = checksum(&doc).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn checksum_ignores_key_insertion_order() {
        let mut forward = Map::new();
        forward.insert("a".to_string(), json!(1));
        forward.insert("b".to_string(), json!({"y": [1, 2], "x": null}));
        let mut backward = Map::new();
        backward.insert("b".to_string(), json!({"x": null, "y": [1, 2]}));
        backward.insert("a".to_string(), json!(1));

        assert_eq!(
            checksum(&Value::Object(forward)).unwrap(),
            checksum(&Value::Object(backward)).unwrap()
        );
    }

    #[test]
    fn checksum_changes_with_content_and_array_order() {
        let base = checksum(&json!({"title": "A"})).unwrap();
        assert_ne!(base, checksum(&json!({"title": "B"})).unwrap());
        assert_ne!(
            checksum(&json!({"l": [1, 2]})).unwrap(),
            checksum(&json!({"l": [2, 1]})).unwrap()
        );
    }

    #[test]
    fn canonical_form_is_compact_and_sorted() {
        let bytes = canonical_bytes(&json!({"b": "\"q\"", "a": [true, 1.5]})).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":[true,1.5],"b":"\"q\""}"#
        );
    }

    #[test]
    fn strip_removes_only_top_level_store_fields() {
        let mut doc = json!({
            "title": "A",
            "created": "x",
            "modified": "y",
            "checksum": "z",
            "deleted": true,
            "descriptions": {"entry": {"modified": "kept"}}
        });
        strip_store_fields(&mut doc);
        assert_eq!(
            doc,
            json!({"title": "A", "descriptions": {"entry": {"modified": "kept"}}})
        );

        let mut scalar = json!("plain");
        strip_store_fields(&mut scalar);
        assert_eq!(scalar, json!("plain"));
    }

    #[test]
    fn timestamps_do_not_influence_checksum_after_strip() {
        let mut with_times = json!({"title": "A", "created": "2020", "modified": "2021"});
        strip_store_fields(&mut with_times);
        assert_eq!(
            checksum(&with_times).unwrap(),
            checksum(&json!({"title": "A"})).unwrap()
        );
    }
}
