//! Text codec: frame string ↔ envelope.
//!
//! Decoding is where protocol violations are detected.  Every failure maps to
//! a [`ProtocolError`] whose `Display` text is exactly what the relay sends
//! back to the client inside an `error` envelope.

use serde_json::error::Category;
use thiserror::Error;

use crate::protocol::envelope::{ClientEnvelope, ServerEnvelope};

/// Errors raised while decoding or encoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON (or not valid UTF-8).
    #[error("Invalid message format")]
    Malformed(#[source] Option<serde_json::Error>),

    /// The frame is JSON but not a known envelope: unknown `type`, missing
    /// required field, or a field of the wrong type.
    #[error("Invalid message format: {0}")]
    InvalidEnvelope(String),

    /// A `join` envelope named an empty room.
    #[error("Room name must not be empty")]
    EmptyRoom,

    /// An outbound envelope could not be serialized.  Not expected in
    /// practice since every field is a string.
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Parses one inbound text frame into a [`ClientEnvelope`].
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] for syntactically invalid JSON.
/// - [`ProtocolError::InvalidEnvelope`] for valid JSON that is not a known
///   envelope.
/// - [`ProtocolError::EmptyRoom`] for a `join` whose room is `""`.  Any
///   other string, whitespace included, is a valid room name.
pub fn decode_client_envelope(frame: &str) -> Result<ClientEnvelope, ProtocolError> {
    let envelope: ClientEnvelope = serde_json::from_str(frame).map_err(|e| match e.classify() {
        Category::Data => ProtocolError::InvalidEnvelope(e.to_string()),
        Category::Syntax | Category::Eof | Category::Io => ProtocolError::Malformed(Some(e)),
    })?;

    if let ClientEnvelope::Join { room } = &envelope {
        if room.is_empty() {
            return Err(ProtocolError::EmptyRoom);
        }
    }

    Ok(envelope)
}

/// Parses an inbound binary frame by first reading it as UTF-8 text.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the bytes are not UTF-8, otherwise
/// the same errors as [`decode_client_envelope`].
pub fn decode_client_bytes(bytes: &[u8]) -> Result<ClientEnvelope, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::Malformed(None))?;
    decode_client_envelope(text)
}

/// Serializes an outbound envelope to its JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_server_envelope(envelope: &ServerEnvelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::Encode)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
