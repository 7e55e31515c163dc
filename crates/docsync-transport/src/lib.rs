//! Transport abstraction between docsync peers.
//!
//! The protocol in `docsync-peer` is written against the `Transport`
//! trait only. `LoopbackTransport` is the one concrete implementation
//! shipped here: an in-process pub/sub broker suitable for tests and for
//! embedding docsync in a single process. A real deployment supplies its
//! own `Transport` over whatever wire it likes.

pub mod transport;

pub use transport::{LoopbackNetwork, LoopbackTransport, Transport, TransportError};
