//! Control Protocol
//!
//! Text protocol spoken between remote clients and the face over UDP.
//!
//! # Message Format
//!
//! ```text
//! inbound:   t:<timestamp>;s:<reply host>;p:<reply port>;d:<key>=<value>
//! OK:        status:OK;arousal:<i>;pleasure:<i>;blush:<i>;gazex:<i>;gazey:<i>;gazez:<i>;talking:<b>;idle:<b>
//! ERROR:     status:ERROR;error:"<message>"
//! ```
//!
//! Field order is irrelevant. All four inbound fields are required; the
//! state machine reports every missing one in a single composite error.

pub mod codec;
pub mod command;
pub mod status;

pub use codec::{decode, CodecError, Fields};
pub use command::{DataField, InboundCommand, RequiredField};
pub use status::{OutboundStatus, StatusTargets};

use std::fmt;

use thiserror::Error;

/// Parameters that can be set through the `d` field
///
/// Maps wire keys to parameters explicitly; there is no name-based lookup
/// of state fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Target arousal (integer)
    Arousal,
    /// Target pleasure (integer)
    Pleasure,
    /// Target blush (integer, 100 = full intensity)
    Blush,
    /// Horizontal gaze target (integer)
    GazeX,
    /// Vertical gaze target (integer)
    GazeY,
    /// Gaze depth target (integer)
    GazeZ,
    /// Named expression preset with intensity, `name%percent`
    Expression,
    /// Talking flag (boolean)
    Talking,
    /// Idle flag (boolean)
    Idle,
}

impl Parameter {
    /// Every recognized parameter, in wire documentation order
    pub const ALL: [Parameter; 9] = [
        Self::Arousal,
        Self::Pleasure,
        Self::Blush,
        Self::GazeX,
        Self::GazeY,
        Self::GazeZ,
        Self::Expression,
        Self::Talking,
        Self::Idle,
    ];

    /// Resolve a wire key
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }

    /// Wire key for this parameter
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Arousal => "arousal",
            Self::Pleasure => "pleasure",
            Self::Blush => "blush",
            Self::GazeX => "gazex",
            Self::GazeY => "gazey",
            Self::GazeZ => "gazez",
            Self::Expression => "expression",
            Self::Talking => "talking",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single problem with an inbound command
///
/// These are normal outcomes, answered with an ERROR status. The display
/// strings are what the client sees inside `error:"..."`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The message could not be split into fields
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// A required field is absent
    #[error("{} is missing.", .0.describe())]
    MissingField(RequiredField),

    /// The timestamp is older than the last accepted one
    #[error("Dropped because t ({timestamp}) is smaller than previous timestamp ({last_accepted}).")]
    StaleTimestamp {
        /// Timestamp carried by the rejected message
        timestamp: i64,
        /// Last accepted timestamp at the time of rejection
        last_accepted: i64,
    },

    /// A typed value could not be parsed
    #[error("\"{value}\" is not a valid {expected} for {field}.")]
    NumericParse {
        /// Field or parameter name
        field: String,
        /// Raw value received
        value: String,
        /// What was expected ("integer", "boolean", "port")
        expected: &'static str,
    },

    /// The `d` key is not a known parameter
    #[error("Unknown parameter \"{0}\"")]
    UnknownParameter(String),

    /// Unknown preset name or malformed `name%percent`
    #[error("Expression error: {0}")]
    ExpressionLookup(String),
}

/// Composite rejection of one command
///
/// Displays every problem in order, separated by spaces, so the client sees
/// all missing fields at once instead of only the first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolErrors(Vec<ProtocolError>);

impl ProtocolErrors {
    /// Wrap a list of problems
    #[must_use]
    pub fn new(errors: Vec<ProtocolError>) -> Self {
        Self(errors)
    }

    /// Individual problems in the order they were found
    pub fn iter(&self) -> impl Iterator<Item = &ProtocolError> {
        self.0.iter()
    }

    /// Number of problems
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no problems (only for hand-built values)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<ProtocolError> for ProtocolErrors {
    fn from(error: ProtocolError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ProtocolErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_keys_round_trip() {
        for parameter in Parameter::ALL {
            assert_eq!(Parameter::from_key(parameter.key()), Some(parameter));
        }
        assert_eq!(Parameter::from_key("foobar"), None);
        assert_eq!(Parameter::from_key("Arousal"), None);
    }

    #[test]
    fn test_unknown_parameter_message() {
        let err = ProtocolError::UnknownParameter("foobar".to_string());
        assert_eq!(err.to_string(), "Unknown parameter \"foobar\"");
    }

    #[test]
    fn test_composite_message_lists_every_problem() {
        let errors = ProtocolErrors::new(vec![
            ProtocolError::MissingField(RequiredField::Port),
            ProtocolError::MissingField(RequiredField::Data),
        ]);

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.to_string(),
            "p (port to answer to) is missing. d (data with key=value) is missing."
        );
    }

    #[test]
    fn test_stale_message_mentions_previous_timestamp() {
        let err = ProtocolError::StaleTimestamp {
            timestamp: 4,
            last_accepted: 9,
        };
        assert!(err.to_string().contains("smaller than previous timestamp"));
    }
}
