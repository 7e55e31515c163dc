//! The document archive format: a flat, portable encoding of an event
//! graph (spec.md §6).

use std::collections::BTreeMap;

use docsync_core::{Document, Event, Hash};
use serde::{Deserialize, Serialize};

/// On-disk archive of an event graph: every event keyed by its hex hash,
/// plus a registration-order list of those hashes.
///
/// `timestamps` is a holdover name from the source format rather than a
/// literal timestamp list — it records the order events were registered
/// in, which for a converter-produced archive is always root-first.
#[derive(Debug, Serialize, Deserialize)]
pub struct Archive {
    pub events: BTreeMap<String, Event>,
    pub timestamps: Vec<String>,
}

impl Archive {
    /// Build an archive holding a single root `SET` event that assigns
    /// `value` as the whole document (the `up` direction, spec.md §6).
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        let mut event = Event::new("SET");
        event.args = docsync_core::set_args(Vec::new(), value);
        let hash = event.hash()?;
        let hex = hash.to_hex();

        let mut events = BTreeMap::new();
        events.insert(hex.clone(), event);
        Ok(Self {
            events,
            timestamps: vec![hex],
        })
    }

    /// Replay every event in this archive into a fresh `Document`,
    /// registering them in `timestamps` order.
    pub fn into_document(self) -> Document {
        let mut document = Document::new();
        for hex in &self.timestamps {
            if let Some(event) = self.events.get(hex) {
                document
                    .register(event.clone())
                    .expect("archived event serializes to JSON infallibly");
            }
        }
        document
    }

    /// The unique registered hash whose hex form starts with `prefix`.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Hash, PrefixError> {
        let matches: Vec<&String> = self
            .timestamps
            .iter()
            .filter(|hex| hex.starts_with(prefix))
            .collect();
        match matches.as_slice() {
            [] => Err(PrefixError::NoMatch(prefix.to_string())),
            [single] => Hash::from_hex(single).map_err(|_| PrefixError::NoMatch(prefix.to_string())),
            _ => Err(PrefixError::Ambiguous(prefix.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("no event hash matches prefix '{0}'")]
    NoMatch(String),
    #[error("prefix '{0}' matches more than one event")]
    Ambiguous(String),
}
