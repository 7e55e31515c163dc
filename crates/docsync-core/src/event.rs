//! The content-addressed event model (spec.md §3, §4.3).

use serde::{Deserialize, Serialize};
use serde_json::Map;
use thiserror::Error;

use crate::hash::{hash, Hash, ROOT_PARENT};
use crate::json::{path_from_json, Json, Path};
use crate::state::{Primitive, State, StateError};

/// Event arguments: always a JSON object (handler-specific keys).
pub type Args = Map<String, Json>;

/// An immutable-by-convention, content-addressed mutation record.
///
/// Identity is the hash of the canonical `(parent, handler, args)` tuple —
/// no timestamps, no author. Field order matters: this struct's
/// `Serialize` derive emits fields in declaration order (`parent`,
/// `handler`, `args`), which is the canonical wire/hash form fixed by
/// spec.md §6, not the alphabetically-sorted order `Json`'s `BTreeMap`
/// objects otherwise get.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Hash of the parent event, or `""` for a root event.
    pub parent: String,
    pub handler: String,
    pub args: Args,
}

/// Errors deriving primitives from an event's arguments (spec.md §4.3, §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("No path provided")]
    NoPath,
    #[error("Bad path")]
    BadPath,
    #[error("No value provided")]
    NoValue,
    #[error("unknown handler: '{0}'")]
    UnknownHandler(String),
}

/// Errors applying an event directly to a `State` (get-primitives, then apply).
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl Event {
    /// A new root event with the given handler and empty arguments.
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            parent: ROOT_PARENT.to_string(),
            handler: handler.into(),
            args: Map::new(),
        }
    }

    /// Whether this event has no parent (is a chain root).
    pub fn is_root(&self) -> bool {
        self.parent == ROOT_PARENT
    }

    /// Set this event's parent to `other`'s hash.
    pub fn set_parent(&mut self, other: &Event) -> serde_json::Result<()> {
        self.parent = other.hash()?.to_hex();
        Ok(())
    }

    /// The content hash of this event's canonical `(parent, handler, args)` form.
    pub fn hash(&self) -> serde_json::Result<Hash> {
        hash(self)
    }

    /// Derive the primitives this event produces, per its handler.
    ///
    /// Base handlers:
    /// - `SET`: requires `args.path` (a JSON array) and `args.value`; emits one `Set`.
    /// - `DELETE`: requires `args.path`; emits one `Delete`.
    ///
    /// Any other handler is rejected — the base protocol's dispatch is a
    /// closed set, not an open registry (spec.md §9).
    pub fn get_primitives(&self) -> Result<Vec<Primitive>, EventError> {
        match self.handler.as_str() {
            "SET" => {
                let path = self.get_path()?;
                let value = self.args.get("value").cloned().ok_or(EventError::NoValue)?;
                Ok(vec![Primitive::Set { path, value }])
            }
            "DELETE" => {
                let path = self.get_path()?;
                Ok(vec![Primitive::Delete { path }])
            }
            other => Err(EventError::UnknownHandler(other.to_string())),
        }
    }

    fn get_path(&self) -> Result<Path, EventError> {
        let raw = self.args.get("path").ok_or(EventError::NoPath)?;
        path_from_json(raw).map_err(|_| EventError::BadPath)
    }

    /// Derive this event's primitives and apply them to `state`, in order,
    /// failing fast on the first error.
    pub fn apply(&self, state: &mut State) -> Result<(), ApplyError> {
        for primitive in self.get_primitives()? {
            state.apply(&primitive)?;
        }
        Ok(())
    }
}

/// Build a `SET` event's arguments from a path and value, as used by the
/// `up` direction of the document converter (spec.md §6).
pub fn set_args(path: Path, value: Json) -> Args {
    let mut args = Map::new();
    args.insert("path".to_string(), crate::json::path_to_json(&path));
    args.insert("value".to_string(), value);
    args
}

/// Build a `DELETE` event's arguments from a path.
pub fn delete_args(path: Path) -> Args {
    let mut args = Map::new();
    args.insert("path".to_string(), crate::json::path_to_json(&path));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_event_has_empty_parent() {
        assert!(Event::new("SET").is_root());
    }

    #[test]
    fn hash_depends_only_on_parent_handler_args() {
        let a = Event::new("SET");
        let mut b = Event::new("SET");
        b.args.insert("extra".into(), json!(1));
        assert_ne!(a.hash().unwrap(), b.hash().unwrap());

        let c = Event::new("SET");
        assert_eq!(a.hash().unwrap(), c.hash().unwrap());
    }

    #[test]
    fn known_vector_matches_original_implementation() {
        // From original_source/djconvert/app/main_test.go
        let mut event = Event::new("SET");
        event.args = set_args(vec![], json!({"hello": "world"}));
        assert_eq!(
            event.hash().unwrap().to_hex(),
            "aa582b4df04ba01af5205e702d4d16ed0b2c0705"
        );
    }

    #[test]
    fn set_parent_chains_hashes() {
        let root = Event::new("root");
        let mut child = Event::new("child");
        child.set_parent(&root).unwrap();
        assert_eq!(child.parent, root.hash().unwrap().to_hex());
    }

    #[test]
    fn set_requires_path() {
        let mut event = Event::new("SET");
        event.args.insert("value".into(), json!("world"));
        assert_eq!(event.get_primitives().unwrap_err(), EventError::NoPath);
    }

    #[test]
    fn set_requires_array_path() {
        let mut event = Event::new("SET");
        event.args.insert("path".into(), json!(7));
        event.args.insert("value".into(), json!("world"));
        assert_eq!(event.get_primitives().unwrap_err(), EventError::BadPath);
    }

    #[test]
    fn set_requires_value() {
        let mut event = Event::new("SET");
        event.args.insert("path".into(), json!(["hello"]));
        assert_eq!(event.get_primitives().unwrap_err(), EventError::NoValue);
    }

    #[test]
    fn set_produces_one_set_primitive() {
        let mut event = Event::new("SET");
        event.args.insert("path".into(), json!(["hello"]));
        event.args.insert("value".into(), json!("world"));
        let primitives = event.get_primitives().unwrap();
        assert_eq!(
            primitives,
            vec![Primitive::Set {
                path: vec![crate::json::PathSegment::Key("hello".into())],
                value: json!("world"),
            }]
        );
    }

    #[test]
    fn delete_requires_path() {
        let event = Event::new("DELETE");
        assert_eq!(event.get_primitives().unwrap_err(), EventError::NoPath);
    }

    #[test]
    fn unknown_handler_is_rejected() {
        let event = Event::new("WIGGLE");
        assert_eq!(
            event.get_primitives().unwrap_err(),
            EventError::UnknownHandler("WIGGLE".to_string())
        );
    }

    #[test]
    fn apply_sets_state_directly() {
        let mut event = Event::new("SET");
        event.args = set_args(vec![], json!({"hello": "world"}));
        let mut state = State::new();
        event.apply(&mut state).unwrap();
        assert_eq!(state.export(), json!({"hello": "world"}));
    }

    #[test]
    fn apply_fails_fast_on_bad_primitives() {
        let event = Event::new("SET");
        let mut state = State::new();
        assert!(event.apply(&mut state).is_err());
    }

    #[test]
    fn apply_fails_on_unapplyable_primitive() {
        let mut event = Event::new("SET");
        event.args = set_args(
            vec![
                crate::json::PathSegment::Key("this".into()),
                crate::json::PathSegment::Key("that".into()),
            ],
            json!("the other thing"),
        );
        let mut state = State::new();
        assert!(event.apply(&mut state).is_err());
    }
}
