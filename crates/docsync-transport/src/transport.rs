//! The `Transport` trait and its in-process `LoopbackTransport` implementation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("already connected to {0}")]
    AlreadyConnected(String),
    #[error("unknown address: {0}")]
    UnknownAddress(String),
}

/// A peer's view of the network: an opaque pub/sub channel to the rest of
/// the world, addressed by a topic string.
///
/// This is the abstraction boundary named in spec.md §4.5 — the protocol
/// layer never opens a socket or manages a key exchange itself, it only
/// calls `connect`, `publish`, and reacts to messages delivered through the
/// receive callback.
pub trait Transport {
    /// Join the broker at `addr`. Calling this twice with the same address
    /// is an error; calling it again after `close` reconnects.
    fn connect(&mut self, addr: &str) -> Result<(), TransportError>;

    /// Broadcast `message` to every other peer connected to the same
    /// broker. Delivery excludes the publisher itself.
    fn publish(&self, message: serde_json::Value) -> Result<(), TransportError>;

    /// Install the callback invoked for every message this peer receives.
    /// Replaces any previously installed callback.
    fn set_receive_callback(&mut self, f: Box<dyn FnMut(serde_json::Value) + Send>);

    /// Leave the broker. A no-op if not connected.
    fn close(&mut self);
}

type Callback = Box<dyn FnMut(serde_json::Value) + Send>;

struct Broker {
    subscribers: HashMap<u64, Arc<Mutex<Option<Callback>>>>,
    next_id: u64,
}

impl Broker {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 0,
        }
    }
}

/// A shared, in-process pub/sub broker keyed by topic name.
///
/// Each topic is an isolated broadcast domain, the way `setupServer()` in
/// the original implementation stood up one server per test; here a topic
/// is just a map key rather than a listening socket, since no real network
/// I/O is in scope.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    topics: Arc<Mutex<HashMap<String, Arc<Mutex<Broker>>>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn broker_for(&self, addr: &str) -> Arc<Mutex<Broker>> {
        self.topics
            .lock()
            .entry(addr.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Broker::new())))
            .clone()
    }
}

/// A `Transport` backed by a `LoopbackNetwork`. Connect, publish, and close
/// all execute synchronously in the caller's thread.
pub struct LoopbackTransport {
    network: LoopbackNetwork,
    broker: Option<Arc<Mutex<Broker>>>,
    subscriber_id: Option<u64>,
    callback: Arc<Mutex<Option<Callback>>>,
}

impl LoopbackTransport {
    pub fn new(network: LoopbackNetwork) -> Self {
        Self {
            network,
            broker: None,
            subscriber_id: None,
            callback: Arc::new(Mutex::new(None)),
        }
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self, addr: &str) -> Result<(), TransportError> {
        if self.broker.is_some() {
            return Err(TransportError::AlreadyConnected(addr.to_string()));
        }
        let broker = self.network.broker_for(addr);
        let id = {
            let mut guard = broker.lock();
            let id = guard.next_id;
            guard.next_id += 1;
            guard.subscribers.insert(id, self.callback.clone());
            id
        };
        debug!(addr, id, "connected to loopback broker");
        self.broker = Some(broker);
        self.subscriber_id = Some(id);
        Ok(())
    }

    fn publish(&self, message: serde_json::Value) -> Result<(), TransportError> {
        let broker = self.broker.as_ref().ok_or(TransportError::NotConnected)?;
        let id = self.subscriber_id.expect("broker set implies subscriber_id set");
        let subscribers: Vec<_> = {
            let guard = broker.lock();
            guard
                .subscribers
                .iter()
                .filter(|(sub_id, _)| **sub_id != id)
                .map(|(_, cb)| cb.clone())
                .collect()
        };
        for cb in subscribers {
            let mut slot = cb.lock();
            if let Some(f) = slot.as_mut() {
                f(message.clone());
            } else {
                warn!("dropping message: subscriber has no receive callback installed");
            }
        }
        Ok(())
    }

    fn set_receive_callback(&mut self, f: Box<dyn FnMut(serde_json::Value) + Send>) {
        *self.callback.lock() = Some(f);
    }

    fn close(&mut self) {
        if let (Some(broker), Some(id)) = (self.broker.take(), self.subscriber_id.take()) {
            broker.lock().subscribers.remove(&id);
        }
    }
}
