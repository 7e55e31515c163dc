//! Wire message type tags and constructors (spec.md §4.6, §6).

pub const REQUEST_TIP: &str = "01-request-tip";
pub const PUBLISH_TIP: &str = "01-publish-tip";
pub const REQUEST_HISTORY: &str = "01-request-history";
pub const PUBLISH_HISTORY: &str = "01-publish-history";

use docsync_core::{Event, Hash};
use serde_json::{json, Value};

pub fn request_tip() -> Value {
    json!({"type": REQUEST_TIP})
}

pub fn publish_tip(tip: Option<Hash>) -> Value {
    json!({
        "type": PUBLISH_TIP,
        "tip_hash": tip.map(|h| h.to_hex()).unwrap_or_default(),
    })
}

pub fn request_history() -> Value {
    json!({"type": REQUEST_HISTORY})
}

pub fn publish_history_not_found() -> Value {
    json!({"type": PUBLISH_HISTORY, "tip_hash": "", "error": "not-found"})
}

pub fn publish_history_root_not_found(tip: Hash) -> Value {
    json!({"type": PUBLISH_HISTORY, "tip_hash": tip.to_hex(), "error": "root-not-found"})
}

pub fn publish_history_ok(tip: Hash, chain: &[Event]) -> Value {
    json!({
        "type": PUBLISH_HISTORY,
        "tip_hash": tip.to_hex(),
        "history": chain,
    })
}
