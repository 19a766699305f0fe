//! Inbound Message Queue
//!
//! FIFO shared between the listener task (producer) and the dispatcher
//! (consumer). Draining swaps the whole deque out under the lock, so a
//! message is either in this tick's batch or the next one, never split or
//! lost.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;

/// One received datagram
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundPacket {
    /// Datagram text (invalid UTF-8 replaced)
    pub payload: String,
    /// Sender address, `None` for locally injected messages
    pub from: Option<SocketAddr>,
}

impl InboundPacket {
    /// A packet received from `from`
    pub fn new(payload: impl Into<String>, from: SocketAddr) -> Self {
        Self {
            payload: payload.into(),
            from: Some(from),
        }
    }

    /// A packet injected without a network sender
    pub fn local(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            from: None,
        }
    }
}

/// Thread-safe inbound FIFO
///
/// Cloning shares the same queue.
#[derive(Clone, Debug, Default)]
pub struct MessageQueue {
    inner: Arc<Mutex<VecDeque<InboundPacket>>>,
}

impl MessageQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet
    pub fn push(&self, packet: InboundPacket) {
        self.inner.lock().push_back(packet);
    }

    /// Take every queued packet in arrival order
    #[must_use]
    pub fn drain(&self) -> Vec<InboundPacket> {
        let batch = std::mem::take(&mut *self.inner.lock());
        batch.into()
    }

    /// Number of queued packets
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
