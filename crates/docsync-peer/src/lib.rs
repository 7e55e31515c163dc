//! The docsync gossip protocol peer.
//!
//! `SimpleClient` wraps a `docsync_core::Document` with a `Transport` and
//! implements the five-message wire protocol in `message`. It has no
//! networking of its own: callers supply a `Transport` (typically
//! `docsync_transport::LoopbackTransport` for in-process use, or their own
//! implementation for a real deployment).

pub mod client;
pub mod message;

pub use client::{run_to_quiescence, PromoteError, SimpleClient};
pub use message::{PUBLISH_HISTORY, PUBLISH_TIP, REQUEST_HISTORY, REQUEST_TIP};
