//! Wire Codec
//!
//! Splits raw datagrams into `key:value` fields and formats status packets.
//!
//! # Field Format
//!
//! ```text
//! key:value;key:value;...
//! ```
//!
//! A segment is split at its *first* `:`, so values may themselves contain
//! colons (IPv6 reply hosts, for example). Segments without any `:` are a
//! [`CodecError::MalformedField`]; a key that appears twice is a
//! [`CodecError::DuplicateField`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use thiserror::Error;

/// Separator between fields
pub const FIELD_SEPARATOR: char = ';';

/// Separator between a field's key and value
pub const KEY_VALUE_SEPARATOR: char = ':';

/// Decoded fields of one message
pub type Fields = HashMap<String, String>;

/// Failures while splitting a message into fields
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A segment has no `:` separator
    #[error("Malformed field \"{0}\" (expected key:value).")]
    MalformedField(String),

    /// The same key appears more than once
    #[error("Field \"{0}\" appears more than once.")]
    DuplicateField(String),

    /// A status packet could not be interpreted (client side)
    #[error("Malformed status message: {0}")]
    MalformedStatus(String),
}

/// Split a raw message into its fields
///
/// Surrounding whitespace of the whole datagram (a trailing newline from a
/// shell client, for instance) is ignored. Keys and values are otherwise
/// taken verbatim.
///
/// # Errors
///
/// Returns [`CodecError::MalformedField`] for a segment without `:` (this
/// includes empty segments such as a trailing `;`) and
/// [`CodecError::DuplicateField`] for repeated keys.
pub fn decode(raw: &str) -> Result<Fields, CodecError> {
    let mut fields = Fields::new();

    for segment in raw.trim().split(FIELD_SEPARATOR) {
        let (key, value) = segment
            .split_once(KEY_VALUE_SEPARATOR)
            .ok_or_else(|| CodecError::MalformedField(segment.to_string()))?;

        match fields.entry(key.to_string()) {
            Entry::Occupied(_) => return Err(CodecError::DuplicateField(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
            }
        }
    }

    Ok(fields)
}

/// Join `(key, value)` pairs into wire format
pub(crate) fn encode_fields<'a>(fields: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut out = String::new();
    for (i, (key, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(FIELD_SEPARATOR);
        }
        out.push_str(key);
        out.push(KEY_VALUE_SEPARATOR);
        out.push_str(&value);
    }
    out
}
