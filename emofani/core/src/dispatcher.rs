//! Tick Dispatcher
//!
//! The single consumer of the [`MessageQueue`] and the only caller of the
//! [`ExpressionStateMachine`]. Driven at a fixed rate by the render loop.
//!
//! # One Tick
//!
//! ```text
//! drain queue (all pending, FIFO)
//!   └─ for each packet: apply_raw ──► OK / ERROR ──► StatusSink
//! advance state machine by dt
//!   └─ idle pose changed? ──► unsolicited OK ──► StatusSink
//! ```
//!
//! Send failures are logged and counted; they never stop the pass and a
//! dequeued packet is never re-queued.

use serde::Serialize;
use tracing::{debug, warn};

use crate::protocol::OutboundStatus;
use crate::state::ExpressionStateMachine;
use crate::transport::{Destination, MessageQueue, StatusSink};

/// What happened during one [`Dispatcher::tick`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Packets taken from the queue
    pub processed: usize,
    /// Packets applied successfully
    pub accepted: usize,
    /// Packets answered with an ERROR
    pub rejected: usize,
    /// An idle pose was generated and announced
    pub idle_update: bool,
    /// Statuses that could not be delivered
    pub send_failures: usize,
}

impl TickReport {
    /// Nothing was received or sent
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.processed == 0 && !self.idle_update
    }
}

/// Drains inbound packets into the state machine and answers each one
pub struct Dispatcher<S: StatusSink> {
    queue: MessageQueue,
    machine: ExpressionStateMachine,
    sink: S,
}

impl<S: StatusSink> Dispatcher<S> {
    /// Create a dispatcher consuming `queue`
    pub fn new(queue: MessageQueue, machine: ExpressionStateMachine, sink: S) -> Self {
        Self {
            queue,
            machine,
            sink,
        }
    }

    /// The queue this dispatcher consumes
    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// State machine, for reading state
    pub fn machine(&self) -> &ExpressionStateMachine {
        &self.machine
    }

    /// State machine, for runtime configuration changes
    pub fn machine_mut(&mut self) -> &mut ExpressionStateMachine {
        &mut self.machine
    }

    /// Status sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Process every pending packet, then advance the face by `dt` seconds
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();

        for packet in self.queue.drain() {
            report.processed += 1;

            let outcome = self.machine.apply_raw(&packet.payload);
            match &outcome {
                Ok(()) => report.accepted += 1,
                Err(errors) => {
                    report.rejected += 1;
                    debug!(from = ?packet.from, error = %errors, "Command rejected");
                }
            }

            let status = self.machine.outbound_status(&outcome);
            let destination = self.machine.response_destination();
            self.deliver(&status, &destination, &mut report);
        }

        if self.machine.tick(dt) {
            report.idle_update = true;
            let status = self.machine.ok_status();
            let destination = self.machine.response_destination();
            self.deliver(&status, &destination, &mut report);
        }

        report
    }

    fn deliver(
        &mut self,
        status: &OutboundStatus,
        destination: &Destination,
        report: &mut TickReport,
    ) {
        if let Err(e) = self.sink.send(status, destination) {
            report.send_failures += 1;
            warn!(%destination, error = %e, "Failed to send status");
        }
    }
}
