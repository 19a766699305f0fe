//! Status Responder
//!
//! Outbound side of the protocol. [`StatusSink`] is the seam the dispatcher
//! sends through; [`UdpResponder`] delivers over UDP and [`InMemorySink`]
//! records statuses for tests.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{Destination, TransportError};
use crate::protocol::OutboundStatus;

/// Something that can deliver a status to a destination
pub trait StatusSink {
    /// Deliver one status
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the status could not be sent.
    fn send(
        &mut self,
        status: &OutboundStatus,
        destination: &Destination,
    ) -> Result<(), TransportError>;
}

/// Sends each status as a single UDP datagram
///
/// Every send uses a fresh ephemeral socket of the destination's address
/// family; nothing is kept open between sends.
///
/// IP literals are sent immediately. A hostname never blocks the caller:
/// lookup and delivery run on the current tokio runtime (or a helper thread
/// outside one), and failures there are logged rather than returned.
#[derive(Clone, Copy, Debug, Default)]
pub struct UdpResponder;

impl UdpResponder {
    /// Create a responder
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn literal(destination: &Destination) -> Option<SocketAddr> {
        let host = destination.host.trim().trim_start_matches('[').trim_end_matches(']');
        host.parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, destination.port))
    }

    fn deliver_later(payload: String, destination: Destination) {
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                let target = (destination.host.as_str(), destination.port);
                let resolved = tokio::net::lookup_host(target)
                    .await
                    .ok()
                    .and_then(prefer_ipv4);
                finish_deferred(resolved, &payload, &destination);
            });
        } else {
            std::thread::spawn(move || {
                let resolved = (destination.host.as_str(), destination.port)
                    .to_socket_addrs()
                    .ok()
                    .and_then(prefer_ipv4);
                finish_deferred(resolved, &payload, &destination);
            });
        }
    }
}

impl StatusSink for UdpResponder {
    fn send(
        &mut self,
        status: &OutboundStatus,
        destination: &Destination,
    ) -> Result<(), TransportError> {
        let payload = status.encode();

        match Self::literal(destination) {
            Some(addr) => {
                send_datagram(&payload, addr, destination)?;
                debug!(%destination, ok = status.is_ok(), "Status sent");
            }
            None => {
                debug!(%destination, ok = status.is_ok(), "Resolving status destination");
                Self::deliver_later(payload, destination.clone());
            }
        }
        Ok(())
    }
}

/// First IPv4 address, else whatever came first
fn prefer_ipv4(addrs: impl Iterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let addrs: Vec<SocketAddr> = addrs.collect();
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

fn send_datagram(
    payload: &str,
    addr: SocketAddr,
    destination: &Destination,
) -> Result<(), TransportError> {
    let send_error = |source| TransportError::Send {
        destination: destination.clone(),
        source,
    };

    let bind_addr: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind_addr).map_err(send_error)?;
    socket
        .send_to(payload.as_bytes(), addr)
        .map_err(send_error)?;
    Ok(())
}

fn finish_deferred(resolved: Option<SocketAddr>, payload: &str, destination: &Destination) {
    let result = resolved
        .ok_or_else(|| TransportError::Resolve {
            host: destination.host.clone(),
            port: destination.port,
        })
        .and_then(|addr| send_datagram(payload, addr, destination));

    match result {
        Ok(()) => debug!(%destination, "Status sent"),
        Err(e) => warn!(%destination, error = %e, "Failed to send status"),
    }
}

/// Records statuses instead of sending them
#[derive(Clone, Debug, Default)]
pub struct InMemorySink {
    /// Everything "sent", in order
    pub sent: Vec<(OutboundStatus, Destination)>,
}

impl InMemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for InMemorySink {
    fn send(
        &mut self,
        status: &OutboundStatus,
        destination: &Destination,
    ) -> Result<(), TransportError> {
        self.sent.push((status.clone(), destination.clone()));
        Ok(())
    }
}
