//! Client Helpers
//!
//! For applications that drive a face: format inbound commands and read the
//! status that comes back.
//!
//! ```text
//! CommandBuilder::new("127.0.0.1", 11001)
//!     .set(1700000000000, Parameter::Arousal, 40)
//!   => "t:1700000000000;s:127.0.0.1;p:11001;d:arousal=40"
//! ```
//!
//! Replies are parsed with [`OutboundStatus::parse`](crate::OutboundStatus::parse).

use std::fmt::Display;

use crate::expression::INTENSITY_SEPARATOR;
use crate::protocol::codec::encode_fields;
use crate::protocol::{Parameter, RequiredField};

/// Formats commands that ask for replies at a fixed host and port
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandBuilder {
    reply_host: String,
    reply_port: u16,
}

impl CommandBuilder {
    /// Replies will be sent to `reply_host:reply_port`
    pub fn new(reply_host: impl Into<String>, reply_port: u16) -> Self {
        Self {
            reply_host: reply_host.into(),
            reply_port,
        }
    }

    /// Host replies are requested at
    #[must_use]
    pub fn reply_host(&self) -> &str {
        &self.reply_host
    }

    /// Port replies are requested at
    #[must_use]
    pub fn reply_port(&self) -> u16 {
        self.reply_port
    }

    /// Format a command with a raw `key=value` payload
    ///
    /// The key is not checked, so this can also produce commands the face
    /// will reject.
    #[must_use]
    pub fn build(&self, timestamp: i64, key: &str, value: &str) -> String {
        encode_fields([
            (RequiredField::Timestamp.key(), timestamp.to_string()),
            (RequiredField::Host.key(), self.reply_host.clone()),
            (RequiredField::Port.key(), self.reply_port.to_string()),
            (RequiredField::Data.key(), format!("{key}={value}")),
        ])
    }

    /// Format a command setting one parameter
    #[must_use]
    pub fn set(&self, timestamp: i64, parameter: Parameter, value: impl Display) -> String {
        self.build(timestamp, parameter.key(), &value.to_string())
    }

    /// Format an `expression` command, `intensity` in percent
    #[must_use]
    pub fn expression(&self, timestamp: i64, name: &str, intensity: f64) -> String {
        self.set(
            timestamp,
            Parameter::Expression,
            format_args!("{name}{INTENSITY_SEPARATOR}{intensity}"),
        )
    }
}
