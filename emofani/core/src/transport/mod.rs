//! UDP Transport
//!
//! Gets datagrams in and statuses out:
//! - [`UdpListener`]: background receive task feeding a [`MessageQueue`]
//! - [`MessageQueue`]: thread-safe FIFO drained by the dispatcher each tick
//! - [`StatusSink`]: outbound seam, with [`UdpResponder`] for real sockets
//!   and [`InMemorySink`] for tests
//!
//! # Design Philosophy
//!
//! The listener never touches face state. It only appends raw text to the
//! queue; parsing and state changes happen on the dispatcher's tick, so the
//! state machine needs no locks.
//!
//! ```text
//!   UDP datagram ──► UdpListener ──► MessageQueue ──► Dispatcher::tick
//!                    (tokio task)    (mutex + deque)    (render loop)
//!                                                           │
//!   UDP status   ◄──────────────── StatusSink ◄─────────────┘
//! ```

pub mod listener;
pub mod queue;
pub mod responder;

pub use listener::UdpListener;
pub use queue::{InboundPacket, MessageQueue};
pub use responder::{InMemorySink, StatusSink, UdpResponder};

use std::fmt;

use thiserror::Error;

/// Host and port a status is sent to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination {
    /// Hostname or IP literal
    pub host: String,
    /// UDP port
    pub port: u16,
}

impl Destination {
    /// Create a destination
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Errors from the UDP transport
///
/// These are operational failures, never protocol errors: a bad datagram
/// still produces an ERROR status, while these are only logged or surfaced
/// to whoever started the listener.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The receive port could not be bound
    #[error("Failed to bind UDP port {port}: {source}")]
    Bind {
        /// Requested port
        port: u16,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Receiving on a bound socket failed
    #[error("UDP receive failed: {0}")]
    Receive(#[source] std::io::Error),

    /// A status could not be delivered
    #[error("Failed to send status to {destination}: {source}")]
    Send {
        /// Intended recipient
        destination: Destination,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The reply host did not resolve to any address
    #[error("Could not resolve {host}:{port}")]
    Resolve {
        /// Host that failed to resolve
        host: String,
        /// Port it was paired with
        port: u16,
    },
}
