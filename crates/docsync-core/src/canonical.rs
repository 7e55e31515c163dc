//! Canonical encoding for docsync (spec.md §3, §4.1)
//!
//! All hashed objects are encoded as compact JSON with sorted object keys
//! and no insignificant whitespace. This is the normative encoding: two
//! peers MUST compute bit-identical hashes for equal logical events.

use serde::Serialize;

/// Serialize a value to canonical JSON bytes.
///
/// Sorted-key ordering comes from `Json`'s `BTreeMap`-backed `Object`
/// variant (see `crate::json`), not from anything this function does —
/// it only needs to pick a compact (no-whitespace) writer.
pub fn canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_serialize_sorted() {
        let value = json!({"z": 1, "a": 2, "m": 3});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(bytes, br#"{"a":[1,2,3]}"#);
    }
}
