//! Error types for docsync-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// docsync-core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Canonicalization of a value to JSON failed
    #[error("canonicalization error: {0}")]
    Canonicalize(#[from] serde_json::Error),

    /// A state mutation could not be applied
    #[error(transparent)]
    State(#[from] crate::state::StateError),

    /// An event's arguments could not be turned into primitives
    #[error(transparent)]
    Event(#[from] crate::event::EventError),

    /// An event-graph query failed
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),

    /// Deriving primitives from an event, or applying them, failed
    #[error(transparent)]
    Apply(#[from] crate::event::ApplyError),
}
