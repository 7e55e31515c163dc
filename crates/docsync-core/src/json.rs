//! The dynamic JSON value tree and path segments used throughout docsync.
//!
//! `Json` is `serde_json::Value` rather than a hand-rolled tagged union:
//! with the `preserve_order` feature left disabled (the default), its
//! `Object` variant is backed by a `BTreeMap`, so canonical (sorted-key)
//! serialization falls out of the type itself instead of a sort-on-encode
//! step. Path traversal lives here rather than on `serde_json::Value`
//! directly so the rest of the crate has one place to reason about how a
//! path-segment sequence addresses a location in the tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON value type used by state, events, and the wire protocol.
pub type Json = Value;

/// One step of a path into a `Json` tree: a map key or an array index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A location in a `Json` tree. An empty path denotes the root.
pub type Path = Vec<PathSegment>;

/// Error converting a JSON value into a `Path`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("path segment must be a string or non-negative integer")]
pub struct PathConvertError;

/// Parse a JSON array of strings/non-negative integers into a `Path`.
pub fn path_from_json(value: &Json) -> Result<Path, PathConvertError> {
    let elements = value.as_array().ok_or(PathConvertError)?;
    elements
        .iter()
        .map(|segment| match segment {
            Value::String(s) => Ok(PathSegment::Key(s.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathSegment::Index(i as usize))
                .ok_or(PathConvertError),
            _ => Err(PathConvertError),
        })
        .collect()
}

/// Render a `Path` back to its JSON array form (used when echoing args on the wire).
pub fn path_to_json(path: &Path) -> Json {
    Value::Array(
        path.iter()
            .map(|segment| match segment {
                PathSegment::Key(k) => Value::String(k.clone()),
                PathSegment::Index(i) => Value::Number((*i as u64).into()),
            })
            .collect(),
    )
}

/// An empty JSON object, used as the initial/reset document root.
pub fn empty_object() -> Json {
    Value::Object(Map::new())
}
