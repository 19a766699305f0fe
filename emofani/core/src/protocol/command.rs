//! Inbound Commands
//!
//! Typed view of one decoded control message. Each of the four protocol
//! fields may be absent; every problem found while typing them is collected
//! instead of stopping at the first, so a single ERROR reply can list them
//! all.

use super::codec::{decode, CodecError, Fields};
use super::ProtocolError;

/// The four fields every inbound message must carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredField {
    /// `p`: port to send the reply to
    Port,
    /// `s`: host to send the reply to
    Host,
    /// `t`: message id or timestamp
    Timestamp,
    /// `d`: the `key=value` payload
    Data,
}

impl RequiredField {
    /// Wire key
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Port => "p",
            Self::Host => "s",
            Self::Timestamp => "t",
            Self::Data => "d",
        }
    }

    /// Human readable description used in error replies
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Port => "p (port to answer to)",
            Self::Host => "s (hostname to answer to)",
            Self::Timestamp => "t (message id or timestamp)",
            Self::Data => "d (data with key=value)",
        }
    }
}

/// The `key=value` payload of the `d` field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataField {
    /// Parameter key, e.g. `arousal`
    pub key: String,
    /// Raw value, e.g. `50` or `happy%50`
    pub value: String,
}

impl DataField {
    /// Split `key=value` at the first `=`
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedField`] naming `d` when there is no `=`.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| CodecError::MalformedField(format!("d:{raw}")))?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// One inbound control message
///
/// Built with [`InboundCommand::from_fields`] or [`InboundCommand::parse`].
/// When [`problems`](Self::problems) is empty, all four fields are present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundCommand {
    response_port: Option<u16>,
    response_host: Option<String>,
    timestamp: Option<i64>,
    data: Option<DataField>,
    problems: Vec<ProtocolError>,
}

impl InboundCommand {
    /// Type the decoded fields, collecting every problem
    ///
    /// Problems are recorded in field order `p`, `s`, `t`, `d`. Unknown extra
    /// fields are ignored.
    #[must_use]
    pub fn from_fields(fields: &Fields) -> Self {
        let mut problems = Vec::new();

        let response_port = match fields.get(RequiredField::Port.key()) {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => Some(port),
                _ => {
                    problems.push(ProtocolError::NumericParse {
                        field: RequiredField::Port.key().to_string(),
                        value: raw.clone(),
                        expected: "port",
                    });
                    None
                }
            },
            None => {
                problems.push(ProtocolError::MissingField(RequiredField::Port));
                None
            }
        };

        // A blank host is as unusable as an absent one
        let response_host = fields
            .get(RequiredField::Host.key())
            .map(|host| host.trim())
            .filter(|host| !host.is_empty())
            .map(str::to_string);
        if response_host.is_none() {
            problems.push(ProtocolError::MissingField(RequiredField::Host));
        }

        let timestamp = match fields.get(RequiredField::Timestamp.key()) {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(t) => Some(t),
                Err(_) => {
                    problems.push(ProtocolError::NumericParse {
                        field: RequiredField::Timestamp.key().to_string(),
                        value: raw.clone(),
                        expected: "integer",
                    });
                    None
                }
            },
            None => {
                problems.push(ProtocolError::MissingField(RequiredField::Timestamp));
                None
            }
        };

        let data = match fields.get(RequiredField::Data.key()) {
            Some(raw) => match DataField::parse(raw) {
                Ok(data) => Some(data),
                Err(e) => {
                    problems.push(e.into());
                    None
                }
            },
            None => {
                problems.push(ProtocolError::MissingField(RequiredField::Data));
                None
            }
        };

        Self {
            response_port,
            response_host,
            timestamp,
            data,
            problems,
        }
    }

    /// Decode a raw message and type its fields
    ///
    /// # Errors
    ///
    /// Returns the [`CodecError`] when the message cannot be split into fields.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        decode(raw).map(|fields| Self::from_fields(&fields))
    }

    /// Reply port, if present and valid
    #[must_use]
    pub fn response_port(&self) -> Option<u16> {
        self.response_port
    }

    /// Reply host, if present
    #[must_use]
    pub fn response_host(&self) -> Option<&str> {
        self.response_host.as_deref()
    }

    /// Timestamp, if present and valid
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Data payload, if present and well formed
    #[must_use]
    pub fn data(&self) -> Option<&DataField> {
        self.data.as_ref()
    }

    /// Problems found while typing the fields
    #[must_use]
    pub fn problems(&self) -> &[ProtocolError] {
        &self.problems
    }

    /// Whether the command is structurally complete
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.problems.is_empty()
    }
}
