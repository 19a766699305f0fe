//! Outbound Status
//!
//! Replies sent after every processed command, and unsolicited while idle.
//! OK replies echo the *target* values, not the smoothed ones, so a client
//! sees the state it asked for immediately.

use std::fmt;

use serde::Serialize;

use super::codec::{decode, encode_fields, CodecError, FIELD_SEPARATOR, KEY_VALUE_SEPARATOR};

const STATUS_OK: &str = "OK";
const STATUS_ERROR: &str = "ERROR";

/// Target values and flags echoed by an OK status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusTargets {
    /// Target arousal
    pub arousal: i32,
    /// Target pleasure
    pub pleasure: i32,
    /// Target blush
    pub blush: i32,
    /// Target horizontal gaze
    pub gaze_x: i32,
    /// Target vertical gaze
    pub gaze_y: i32,
    /// Target gaze depth
    pub gaze_z: i32,
    /// Talking flag
    pub talking: bool,
    /// Idle flag
    pub idle: bool,
}

/// A status packet
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum OutboundStatus {
    /// Command accepted (or idle pose changed)
    Ok(StatusTargets),
    /// Command rejected, with a human readable reason
    Error(String),
}

impl OutboundStatus {
    /// Whether this is an OK status
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Serialize to wire format
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Ok(targets) => encode_ok(targets),
            Self::Error(message) => encode_error(message),
        }
    }

    /// Parse a status packet (for clients of the face)
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedStatus`] if the packet is not an OK or
    /// ERROR status, or an OK status lacks a field.
    pub fn parse(raw: &str) -> Result<Self, CodecError> {
        let raw = raw.trim();

        // The error text is free-form and may contain separators, so it is
        // taken verbatim after the prefix instead of being split.
        let error_prefix = format!(
            "status{KEY_VALUE_SEPARATOR}{STATUS_ERROR}{FIELD_SEPARATOR}error{KEY_VALUE_SEPARATOR}"
        );
        if let Some(rest) = raw.strip_prefix(&error_prefix) {
            let message = rest
                .strip_prefix('"')
                .and_then(|m| m.strip_suffix('"'))
                .unwrap_or(rest);
            return Ok(Self::Error(message.to_string()));
        }

        let fields = decode(raw)?;
        match fields.get("status").map(String::as_str) {
            Some(STATUS_OK) => {}
            Some(other) => {
                return Err(CodecError::MalformedStatus(format!(
                    "unexpected status \"{other}\""
                )))
            }
            None => return Err(CodecError::MalformedStatus("status is missing".to_string())),
        }

        let int = |key: &str| -> Result<i32, CodecError> {
            fields
                .get(key)
                .ok_or_else(|| CodecError::MalformedStatus(format!("{key} is missing")))?
                .parse()
                .map_err(|_| CodecError::MalformedStatus(format!("{key} is not an integer")))
        };
        let flag = |key: &str| -> Result<bool, CodecError> {
            fields
                .get(key)
                .ok_or_else(|| CodecError::MalformedStatus(format!("{key} is missing")))?
                .parse()
                .map_err(|_| CodecError::MalformedStatus(format!("{key} is not a boolean")))
        };

        Ok(Self::Ok(StatusTargets {
            arousal: int("arousal")?,
            pleasure: int("pleasure")?,
            blush: int("blush")?,
            gaze_x: int("gazex")?,
            gaze_y: int("gazey")?,
            gaze_z: int("gazez")?,
            talking: flag("talking")?,
            idle: flag("idle")?,
        }))
    }
}

impl fmt::Display for OutboundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode an OK status
#[must_use]
pub fn encode_ok(targets: &StatusTargets) -> String {
    encode_fields([
        ("status", STATUS_OK.to_string()),
        ("arousal", targets.arousal.to_string()),
        ("pleasure", targets.pleasure.to_string()),
        ("blush", targets.blush.to_string()),
        ("gazex", targets.gaze_x.to_string()),
        ("gazey", targets.gaze_y.to_string()),
        ("gazez", targets.gaze_z.to_string()),
        ("talking", targets.talking.to_string()),
        ("idle", targets.idle.to_string()),
    ])
}

/// Encode an ERROR status
#[must_use]
pub fn encode_error(message: &str) -> String {
    encode_fields([
        ("status", STATUS_ERROR.to_string()),
        ("error", format!("\"{message}\"")),
    ])
}
