//! Content hashing (spec.md §4.1)
//!
//! A `Hash` is the SHA-1 digest of a value's canonical JSON encoding.
//! Event identity is defined entirely in terms of this hash: two events
//! with the same `(parent, handler, args)` are the same event.

use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fmt;

use crate::canonical::canonical_bytes;

/// A 20-byte SHA-1 digest, rendered as lowercase hex on the wire and in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; 20]);

/// The distinguished "no parent" hash: the empty string.
pub const ROOT_PARENT: &str = "";

impl Hash {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex representation, the form used on the wire.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a lowercase (or mixed-case) hex string into a `Hash`.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        let bytes = hex::decode(s).map_err(|_| HashParseError)?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| HashParseError)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Error parsing a hex string as a `Hash`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid hash hex string")]
pub struct HashParseError;

/// Compute the content hash of `value`'s canonical JSON encoding.
///
/// Fails only if `value` cannot be canonicalized (spec.md §4.1).
pub fn hash<T: Serialize>(value: &T) -> serde_json::Result<Hash> {
    let bytes = canonical_bytes(value)?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    Ok(Hash(digest.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_deterministic() {
        let value = json!({"hello": "world"});
        assert_eq!(hash(&value).unwrap(), hash(&value).unwrap());
    }

    #[test]
    fn hash_matches_key_independent_of_insertion_order() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(hash(&a).unwrap(), hash(&b).unwrap());
    }

    #[test]
    fn hex_round_trip() {
        let h = hash(&json!("anything")).unwrap();
        assert_eq!(Hash::from_hex(&h.to_hex()).unwrap(), h);
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert_eq!(Hash::from_hex("not hex").unwrap_err(), HashParseError);
        assert_eq!(Hash::from_hex("aa").unwrap_err(), HashParseError);
    }
}
