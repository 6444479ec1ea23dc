//! Canonical rendering of collections and the equality contract.
//!
//! Object keys are ordered lexicographically at every depth; array element
//! order is kept as-is. Two collections are equal iff their canonical
//! strings are equal, so reordering addons or catalogs counts as a change.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use addonmirror_core::AddonCollection;

/// Recursively sort object keys, leaving array order untouched.
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Compact canonical JSON of any serializable document.
pub fn canonical_string<T: Serialize + ?Sized>(doc: &T) -> String {
    match serde_json::to_value(doc) {
        Ok(value) => canonical_value(&value).to_string(),
        Err(err) => {
            tracing::error!("cannot serialize document for comparison: {err}");
            String::new()
        }
    }
}

/// Pretty canonical JSON, for human-readable diffs.
pub fn canonical_pretty<T: Serialize + ?Sized>(doc: &T) -> String {
    serde_json::to_value(doc)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&canonical_value(&v)).ok())
        .unwrap_or_default()
}

pub fn collections_equal(a: &AddonCollection, b: &AddonCollection) -> bool {
    canonical_string(a) == canonical_string(b)
}

/// SHA-256 of the canonical form, hex encoded.
pub fn fingerprint(collection: &AddonCollection) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(collection).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn collection(value: Value) -> AddonCollection {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn canonical_value_sorts_nested_keys() {
        let value = json!({ "b": 1, "a": { "z": [3, 1], "y": null } });
        assert_eq!(
            canonical_value(&value).to_string(),
            r#"{"a":{"y":null,"z":[3,1]},"b":1}"#
        );
    }

    #[test]
    fn key_order_does_not_matter() {
        let a = collection(json!([
            { "transportUrl": "u1", "manifest": { "name": "A", "version": "1", "catalogs": [{ "id": "c", "type": "movie" }] } }
        ]));
        let b = collection(json!([
            { "manifest": { "catalogs": [{ "type": "movie", "id": "c" }], "version": "1", "name": "A" }, "transportUrl": "u1" }
        ]));
        assert!(collections_equal(&a, &b));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[rstest]
    #[case::addon_order(
        json!([{ "transportUrl": "u1", "manifest": {} }, { "transportUrl": "u2", "manifest": {} }]),
        json!([{ "transportUrl": "u2", "manifest": {} }, { "transportUrl": "u1", "manifest": {} }])
    )]
    #[case::catalog_order(
        json!([{ "transportUrl": "u1", "manifest": { "catalogs": [{ "id": "a" }, { "id": "b" }] } }]),
        json!([{ "transportUrl": "u1", "manifest": { "catalogs": [{ "id": "b" }, { "id": "a" }] } }])
    )]
    #[case::renamed(
        json!([{ "transportUrl": "u1", "manifest": { "name": "A" } }]),
        json!([{ "transportUrl": "u1", "manifest": { "name": "B" } }])
    )]
    fn detected_as_different(#[case] a: Value, #[case] b: Value) {
        let (a, b) = (collection(a), collection(b));
        assert!(!collections_equal(&a, &b));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(&AddonCollection::default());
        assert_eq!(fp.len(), 64);
        // sha256("[]")
        assert_eq!(
            fp,
            "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
        );
    }
}
