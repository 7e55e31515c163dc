//! Content-addressed event model, event graph, and JSON state engine.
//!
//! This crate has no I/O of its own: it is the pure, deterministic core
//! that `docsync-transport` and `docsync-peer` build a protocol on top
//! of, and that `docsync-convert` drives directly for offline document
//! conversion.

pub mod canonical;
pub mod error;
pub mod event;
pub mod graph;
pub mod hash;
pub mod json;
pub mod state;

pub use error::{Error, Result};
pub use event::{delete_args, set_args, ApplyError, Args, Event, EventError};
pub use graph::{Document, EventGraph, GraphError};
pub use hash::{hash, Hash, HashParseError, ROOT_PARENT};
pub use json::{Json, Path, PathConvertError, PathSegment};
pub use state::{Primitive, State, StateError};
