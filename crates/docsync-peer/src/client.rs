//! `SimpleClient`: the protocol peer (spec.md §4.6).

use std::collections::VecDeque;
use std::sync::Arc;

use docsync_core::{Document, Event, GraphError, Hash, Primitive};
use docsync_transport::{Transport, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::message;

/// Failure modes of `promote` (spec.md §4.6, §7).
#[derive(Debug, Error)]
pub enum PromoteError {
    #[error("event could not be registered or replayed locally: {0}")]
    Goto(#[from] GraphError),
    #[error("local tip advanced but the group was not notified: {0}")]
    Publish(#[from] TransportError),
}

/// A peer in the docsync gossip protocol.
///
/// Owns a `Document` (event graph + replayed state) and a `Transport`.
/// The transport's receive callback only enqueues into this peer's inbox;
/// `drain_inbox` is what actually dispatches into `receive`. This keeps a
/// peer's own recursive protocol exchanges (e.g. `promote` triggering a
/// remote `request-history` that comes straight back to us) from ever
/// needing to re-enter a `SimpleClient` method while one is already on the
/// stack — the exchange is driven by repeated draining instead, matching
/// §5's single-threaded-per-peer model without requiring the peer itself
/// to be reentrant.
pub struct SimpleClient {
    document: Document,
    transport: Box<dyn Transport + Send>,
    primitive_callback: Option<Box<dyn FnMut(&Primitive) + Send>>,
    inbox: Arc<Mutex<VecDeque<Value>>>,
}

impl SimpleClient {
    pub fn new(mut transport: Box<dyn Transport + Send>) -> Self {
        let inbox = Arc::new(Mutex::new(VecDeque::new()));
        let sink = inbox.clone();
        transport.set_receive_callback(Box::new(move |msg| {
            sink.lock().push_back(msg);
        }));
        Self {
            document: Document::new(),
            transport,
            primitive_callback: None,
            inbox,
        }
    }

    /// Install the callback invoked, in order, for every primitive applied
    /// by a `goto` (replay or promotion). Replaces any previous callback.
    pub fn set_primitive_callback(&mut self, f: Box<dyn FnMut(&Primitive) + Send>) {
        self.primitive_callback = Some(f);
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tip(&self) -> Option<Hash> {
        self.document.tip()
    }

    /// Connect the underlying transport and immediately request the
    /// group's tip, bootstrapping this peer's state (spec.md §4.6
    /// "Initial sync").
    pub fn connect(&mut self, addr: &str) -> Result<(), TransportError> {
        self.transport.connect(addr)?;
        self.request_tip()
    }

    pub fn request_tip(&self) -> Result<(), TransportError> {
        self.transport.publish(message::request_tip())
    }

    pub fn publish_tip(&self) -> Result<(), TransportError> {
        self.transport.publish(message::publish_tip(self.document.tip()))
    }

    pub fn request_history(&self) -> Result<(), TransportError> {
        self.transport.publish(message::request_history())
    }

    /// Publish the full chain from this peer's tip back to its root, or a
    /// protocol-level `error` field if the tip is empty or its chain
    /// cannot be located (spec.md §4.6).
    pub fn publish_history(&self) -> Result<(), TransportError> {
        let Some(tip) = self.document.tip() else {
            return self.transport.publish(message::publish_history_not_found());
        };
        match self.document.graph().chain_to(&tip) {
            Err(_) => self
                .transport
                .publish(message::publish_history_root_not_found(tip)),
            Ok(chain) => {
                let events: Vec<Event> = chain
                    .iter()
                    .map(|hash| {
                        self.document
                            .graph()
                            .get(hash)
                            .cloned()
                            .expect("hash came from this graph's own chain")
                    })
                    .collect();
                self.transport
                    .publish(message::publish_history_ok(tip, &events))
            }
        }
    }

    /// Register `event`, replay to it locally, and announce the result to
    /// the group. Aborts without side effects if `goto` fails; a failure
    /// to publish afterwards leaves the local tip advanced but the group
    /// unnotified (spec.md §4.6, §7 — a later `request-tip` reconverges).
    pub fn promote(&mut self, event: Event) -> Result<(), PromoteError> {
        let hash = self
            .document
            .register(event)
            .expect("Event serializes to JSON infallibly");
        self.goto_with_callback(hash)?;
        self.publish_tip()?;
        self.publish_history()?;
        Ok(())
    }

    fn goto_with_callback(&mut self, hash: Hash) -> Result<(), GraphError> {
        let primitive_callback = &mut self.primitive_callback;
        self.document.goto(hash, move |p| {
            if let Some(cb) = primitive_callback {
                cb(p);
            }
        })
    }

    /// Whether this peer has messages waiting to be dispatched.
    pub fn has_pending(&self) -> bool {
        !self.inbox.lock().is_empty()
    }

    /// Dispatch every message currently queued in this peer's inbox,
    /// draining it to empty. Returns the number of messages processed.
    ///
    /// Dispatching a message may itself `publish` (e.g. replying to a
    /// `request-tip`), which can enqueue new messages for *other* peers
    /// sharing the same transport — never for this peer, since a
    /// transport never delivers a publish back to its own publisher. A
    /// caller driving several peers to convergence should call
    /// `drain_inbox` on each in turn until none of them report more work.
    pub fn drain_inbox(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let next = self.inbox.lock().pop_front();
            match next {
                Some(message) => {
                    self.receive(message);
                    processed += 1;
                }
                None => return processed,
            }
        }
    }

    /// Handle one inbound message. Never fails outright: malformed or
    /// unrecognized messages are logged and dropped (spec.md §4.6, §7).
    fn receive(&mut self, message: Value) {
        let Some(map) = message.as_object() else {
            debug!("Non-{} message", type_name(&message));
            return;
        };
        let Some(msg_type) = map.get("type").and_then(Value::as_str) else {
            debug!("Message with no 'type' param");
            return;
        };

        match msg_type {
            message::REQUEST_TIP => {
                if let Err(e) = self.publish_tip() {
                    warn!(error = %e, "failed to publish tip in response to request-tip");
                }
            }
            message::PUBLISH_TIP => self.handle_publish_tip(map),
            message::REQUEST_HISTORY => {
                if let Err(e) = self.publish_history() {
                    warn!(error = %e, "failed to publish history in response to request-history");
                }
            }
            message::PUBLISH_HISTORY => self.handle_publish_history(map),
            other => debug!("Unfamiliar message type: '{}'", other),
        }
    }

    fn handle_publish_tip(&mut self, map: &serde_json::Map<String, Value>) {
        let Some(tip_hash) = map.get("tip_hash").and_then(Value::as_str) else {
            debug!("Message with bad 'tip_hash' param");
            return;
        };
        let my_tip_hex = self.document.tip().map(|h| h.to_hex()).unwrap_or_default();
        if tip_hash == my_tip_hex {
            return;
        }
        if tip_hash.is_empty() {
            // Remote peer reports no tip of its own; nothing to adopt.
            return;
        }
        let Ok(remote_tip) = Hash::from_hex(tip_hash) else {
            debug!("Message with bad 'tip_hash' param");
            return;
        };
        if self.document.graph().contains(&remote_tip) {
            if let Err(e) = self.goto_with_callback(remote_tip) {
                debug!(error = %e, "failed to goto known remote tip");
            }
        } else if let Err(e) = self.request_history() {
            warn!(error = %e, "failed to request history after unknown tip");
        }
    }

    fn handle_publish_history(&mut self, map: &serde_json::Map<String, Value>) {
        if map.get("history").is_none() {
            if let Some(error) = map.get("error").and_then(Value::as_str) {
                debug!(error, "peer reported no history");
            } else {
                debug!("History message with bad 'history' param");
            }
            return;
        }
        let Some(history) = map.get("history").and_then(Value::as_array) else {
            debug!("History message with bad 'history' param");
            return;
        };
        let Some(tip_hash) = map.get("tip_hash").and_then(Value::as_str) else {
            debug!("Message with bad 'tip_hash' param");
            return;
        };

        let mut decoded = Vec::with_capacity(history.len());
        for raw in history {
            match serde_json::from_value::<Event>(raw.clone()) {
                Ok(event) => decoded.push(event),
                Err(e) => {
                    debug!("{}", e);
                    return;
                }
            }
        }

        for event in &decoded {
            match event.hash() {
                Ok(hash) => self.document.graph_mut().register(hash, event.clone()),
                Err(e) => debug!(error = %e, "failed to hash incoming history event"),
            }
        }

        let Ok(target) = Hash::from_hex(tip_hash) else {
            debug!("Message with bad 'tip_hash' param");
            return;
        };
        if !self.document.graph().contains(&target) {
            debug!("Unknown event {}", tip_hash);
            return;
        }
        if let Err(e) = self.goto_with_callback(target) {
            debug!(error = %e, "failed to goto published history tip");
        }
    }
}

/// Drain every peer's inbox repeatedly until none of them have
/// outstanding messages. Useful for driving a closed set of in-process
/// peers (tests, or a `LoopbackTransport`-based embedding) to a converged
/// state without manually interleaving `drain_inbox` calls.
pub fn run_to_quiescence(peers: &mut [&mut SimpleClient]) {
    loop {
        let mut progressed = false;
        for peer in peers.iter_mut() {
            if peer.drain_inbox() > 0 {
                progressed = true;
            }
        }
        if !progressed {
            return;
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
