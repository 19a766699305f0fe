//! `send` subcommand: one command, one reply

use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::debug;

use emofani_core::{CommandBuilder, OutboundStatus};

use crate::SendArgs;

/// Send the assignment in `args` and wait for the face's status
pub async fn send(args: &SendArgs) -> Result<OutboundStatus> {
    let (key, value) = args
        .assignment
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got \"{}\"", args.assignment))?;

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, args.reply_port))
        .await
        .with_context(|| format!("Failed to bind reply port {}", args.reply_port))?;
    let reply_port = socket.local_addr()?.port();

    let timestamp = args
        .timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let raw = CommandBuilder::new(args.reply_host.clone(), reply_port).build(timestamp, key, value);

    socket
        .send_to(raw.as_bytes(), (args.host.as_str(), args.port))
        .await
        .with_context(|| format!("Failed to send to {}:{}", args.host, args.port))?;
    debug!(command = %raw, "Command sent");

    let mut buf = vec![0u8; 2048];
    let (len, from) = tokio::time::timeout(
        Duration::from_millis(args.timeout_ms),
        socket.recv_from(&mut buf),
    )
    .await
    .with_context(|| format!("No reply within {} ms", args.timeout_ms))??;

    let reply = String::from_utf8_lossy(&buf[..len]);
    debug!(%from, reply = %reply, "Reply received");

    OutboundStatus::parse(&reply).with_context(|| format!("Unreadable reply: {reply}"))
}
