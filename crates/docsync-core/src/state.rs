//! The JSON state tree and the primitives that mutate it (spec.md §4.2).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::json::{empty_object, Json, Path, PathSegment};

/// An atomic mutation of the state tree, derived from an event (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Primitive {
    /// Replace the subtree at `path` with `value`.
    Set { path: Path, value: Json },
    /// Remove the element at `path` from its parent container.
    Delete { path: Path },
}

/// Errors applying a `Primitive` to a `State` (spec.md §4.2, §7).
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("path does not resolve to an existing element")]
    PathNotFound,
    #[error("path segment does not resolve to a {expected}")]
    NotAContainer { expected: &'static str },
    #[error("array index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("cannot delete the document root")]
    RootDelete,
}

/// The mutable JSON document state.
///
/// Invariant: at all times `State` equals the result of applying, in
/// order, every primitive successfully applied since creation. A failed
/// `apply` leaves the state unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    root: Json,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// A new state with the empty map as its root.
    pub fn new() -> Self {
        Self {
            root: empty_object(),
        }
    }

    /// Apply a primitive. On failure the state is left exactly as it was.
    pub fn apply(&mut self, primitive: &Primitive) -> Result<(), StateError> {
        match primitive {
            Primitive::Set { path, value } => self.set(path, value.clone()),
            Primitive::Delete { path } => self.delete(path),
        }
    }

    fn set(&mut self, path: &Path, value: Json) -> Result<(), StateError> {
        if path.is_empty() {
            self.root = value;
            return Ok(());
        }
        let (prefix, last) = path.split_at(path.len() - 1);
        let parent = navigate_mut(&mut self.root, prefix)?;
        match (parent, &last[0]) {
            (Value::Object(map), PathSegment::Key(key)) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            (Value::Array(arr), PathSegment::Index(index)) => {
                if *index < arr.len() {
                    arr[*index] = value;
                    Ok(())
                } else {
                    Err(StateError::IndexOutOfBounds {
                        index: *index,
                        len: arr.len(),
                    })
                }
            }
            (Value::Object(_), PathSegment::Index(_)) => Err(StateError::NotAContainer {
                expected: "array",
            }),
            (Value::Array(_), PathSegment::Key(_)) => Err(StateError::NotAContainer {
                expected: "object",
            }),
            _ => Err(StateError::NotAContainer {
                expected: "object or array",
            }),
        }
    }

    fn delete(&mut self, path: &Path) -> Result<(), StateError> {
        if path.is_empty() {
            return Err(StateError::RootDelete);
        }
        let (prefix, last) = path.split_at(path.len() - 1);
        let parent = navigate_mut(&mut self.root, prefix)?;
        match (parent, &last[0]) {
            (Value::Object(map), PathSegment::Key(key)) => {
                map.remove(key).map(|_| ()).ok_or(StateError::PathNotFound)
            }
            (Value::Array(arr), PathSegment::Index(index)) => {
                if *index < arr.len() {
                    arr.remove(*index);
                    Ok(())
                } else {
                    Err(StateError::IndexOutOfBounds {
                        index: *index,
                        len: arr.len(),
                    })
                }
            }
            (Value::Object(_), PathSegment::Index(_)) => Err(StateError::NotAContainer {
                expected: "array",
            }),
            (Value::Array(_), PathSegment::Key(_)) => Err(StateError::NotAContainer {
                expected: "object",
            }),
            _ => Err(StateError::NotAContainer {
                expected: "object or array",
            }),
        }
    }

    /// A deep copy of the current value, safe for callers to mutate freely.
    pub fn export(&self) -> Json {
        self.root.clone()
    }

    /// Reset the state to the empty map. Used by `Document::goto` before replay.
    pub fn reset(&mut self) {
        self.root = empty_object();
    }
}

/// Walk `path` from `value`, requiring every segment to resolve to an
/// existing container of the matching kind. Read-only: returns before any
/// mutation if the path does not fully resolve.
fn navigate_mut<'a>(value: &'a mut Json, path: &[PathSegment]) -> Result<&'a mut Json, StateError> {
    let mut current = value;
    for segment in path {
        current = step_mut(current, segment)?;
    }
    Ok(current)
}

fn step_mut<'a>(value: &'a mut Json, segment: &PathSegment) -> Result<&'a mut Json, StateError> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.get_mut(key).ok_or(StateError::PathNotFound)
        }
        (Value::Array(arr), PathSegment::Index(index)) => {
            let len = arr.len();
            arr.get_mut(*index)
                .ok_or(StateError::IndexOutOfBounds { index: *index, len })
        }
        (Value::Object(_), PathSegment::Index(_)) => Err(StateError::NotAContainer {
            expected: "array",
        }),
        (Value::Array(_), PathSegment::Key(_)) => Err(StateError::NotAContainer {
            expected: "object",
        }),
        _ => Err(StateError::NotAContainer {
            expected: "object or array",
        }),
    }
}
