//! UDP Listener
//!
//! Binds the receive port on all interfaces and runs a background task that
//! pushes every datagram into the [`MessageQueue`].
//!
//! # Lifecycle
//!
//! ```text
//!   new ──► start ──► (receiving) ──► stop
//!             ▲                        │
//!             └──── set_port ◄─────────┘  (stop + start on the new port)
//! ```
//!
//! Stopping is cooperative: the task selects on a shutdown signal alongside
//! `recv_from`, so `stop` returns once the socket is closed and the port is
//! free again. Dropping the listener also ends the task.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::queue::{InboundPacket, MessageQueue};
use super::TransportError;

/// Largest datagram accepted; longer ones are truncated by the OS
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Pause after a receive error before trying again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Background UDP receiver feeding a [`MessageQueue`]
pub struct UdpListener {
    port: u16,
    queue: MessageQueue,
    running: Option<RunningListener>,
}

struct RunningListener {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl UdpListener {
    /// Create a stopped listener for `port` (0 picks an ephemeral port)
    #[must_use]
    pub fn new(port: u16, queue: MessageQueue) -> Self {
        Self {
            port,
            queue,
            running: None,
        }
    }

    /// Configured receive port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the receive task is running
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }

    /// Address actually bound, while listening
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    /// Bind the port and start receiving
    ///
    /// A running listener is stopped first, so calling this twice rebinds.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the port cannot be bound; the
    /// listener is left stopped.
    pub async fn start(&mut self) -> Result<SocketAddr, TransportError> {
        self.stop().await;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .await
            .map_err(|source| TransportError::Bind {
                port: self.port,
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| TransportError::Bind {
            port: self.port,
            source,
        })?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(receive_loop(socket, self.queue.clone(), shutdown_rx));

        tracing::info!(addr = %local_addr, "UDP listener started");
        self.running = Some(RunningListener {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    /// Stop receiving and release the port
    ///
    /// Does nothing when already stopped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        // The task may already be gone; a failed send is fine
        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            tracing::warn!(error = %e, "UDP listener task ended abnormally");
        }
        tracing::info!(addr = %running.local_addr, "UDP listener stopped");
    }

    /// Change the receive port
    ///
    /// A running listener is rebound immediately; a stopped one uses the new
    /// port on its next [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if rebinding fails; the listener is
    /// then stopped.
    pub async fn set_port(&mut self, port: u16) -> Result<(), TransportError> {
        self.port = port;
        if self.is_listening() {
            self.start().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for UdpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpListener")
            .field("port", &self.port)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}

async fn receive_loop(
    socket: UdpSocket,
    queue: MessageQueue,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            // Fires on an explicit stop and when the listener is dropped
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    let payload = String::from_utf8_lossy(&buf[..len]).into_owned();
                    tracing::trace!(%from, len, "Datagram received");
                    queue.push(InboundPacket::new(payload, from));
                }
                Err(e) => {
                    let err = TransportError::Receive(e);
                    tracing::warn!(error = %err, "Continuing after receive error");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    async fn wait_for_packets(queue: &MessageQueue, count: usize) -> Vec<InboundPacket> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut packets = Vec::new();
        while packets.len() < count && Instant::now() < deadline {
            packets.extend(queue.drain());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        packets
    }

    async fn send_to(port: u16, payload: &str) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        socket
            .send_to(payload.as_bytes(), (Ipv4Addr::LOCALHOST, port))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_receives_into_queue() {
        let queue = MessageQueue::new();
        let mut listener = UdpListener::new(0, queue.clone());
        let addr = listener.start().await.unwrap();
        assert!(listener.is_listening());

        send_to(addr.port(), "t:1;s:127.0.0.1;p:9000;d:arousal=5").await;
        send_to(addr.port(), "second").await;

        let packets = wait_for_packets(&queue, 2).await;
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload, "t:1;s:127.0.0.1;p:9000;d:arousal=5");
        assert!(packets[0].from.is_some());

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let queue = MessageQueue::new();
        let mut listener = UdpListener::new(0, queue.clone());
        let addr = listener.start().await.unwrap();

        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        socket
            .send_to(&[b'a', 0xff, b'b'], (Ipv4Addr::LOCALHOST, addr.port()))
            .await
            .unwrap();

        let packets = wait_for_packets(&queue, 1).await;
        assert_eq!(packets[0].payload, "a\u{fffd}b");

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_fails() {
        let occupied = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let mut listener = UdpListener::new(port, MessageQueue::new());
        let result = listener.start().await;

        assert!(matches!(result, Err(TransportError::Bind { port: p, .. }) if p == port));
        assert!(!listener.is_listening());
    }

    #[tokio::test]
    async fn test_stop_releases_port() {
        let mut listener = UdpListener::new(0, MessageQueue::new());
        let addr = listener.start().await.unwrap();

        listener.stop().await;
        assert!(!listener.is_listening());
        assert_eq!(listener.local_addr(), None);

        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, addr.port()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let mut listener = UdpListener::new(0, MessageQueue::new());
        listener.stop().await;
        assert!(!listener.is_listening());
    }

    #[tokio::test]
    async fn test_set_port_rebinds_running_listener() {
        let queue = MessageQueue::new();
        let mut listener = UdpListener::new(0, queue.clone());
        listener.start().await.unwrap();

        let target_port = {
            let probe = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.unwrap();
            probe.local_addr().unwrap().port()
        };
        listener.set_port(target_port).await.unwrap();

        assert!(listener.is_listening());
        assert_eq!(listener.local_addr().map(|a| a.port()), Some(target_port));

        send_to(target_port, "after rebind").await;
        let packets = wait_for_packets(&queue, 1).await;
        assert_eq!(packets[0].payload, "after rebind");

        listener.stop().await;
    }

    #[tokio::test]
    async fn test_set_port_when_stopped_defers() {
        let mut listener = UdpListener::new(0, MessageQueue::new());
        listener.set_port(4321).await.unwrap();
        assert_eq!(listener.port(), 4321);
        assert!(!listener.is_listening());
    }
}
