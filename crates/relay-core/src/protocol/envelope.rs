//! Wire envelopes.
//!
//! Every frame on the wire is a single JSON object whose `"type"` field names
//! the variant:
//!
//! ```json
//! {"type":"join","room":"Red"}
//! {"type":"message","message":"hi"}
//! {"type":"system","message":"You joined room Red as user-3fa85f","userId":"user-3fa85f"}
//! {"type":"message","from":"user-3fa85f","message":"hi"}
//! {"type":"error","message":"Invalid message format"}
//! ```
//!
//! The two directions use separate enums, so a server-only envelope can never
//! be accepted from a client and vice versa.

use serde::{Deserialize, Serialize};

use crate::domain::connection::ConnectionId;

// ── Client → Server ───────────────────────────────────────────────────────────

/// Envelopes a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientEnvelope {
    /// Request to join the named room.
    Join { room: String },

    /// Text to broadcast to the sender's current room.
    Message { message: String },
}

impl ClientEnvelope {
    /// Wire name of the variant, for log lines that must not include content.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEnvelope::Join { .. } => "join",
            ClientEnvelope::Message { .. } => "message",
        }
    }
}

// ── Server → Client ───────────────────────────────────────────────────────────

/// Envelopes the relay sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEnvelope {
    /// Join confirmation carrying the connection's assigned identity.
    System {
        message: String,
        #[serde(rename = "userId")]
        user_id: ConnectionId,
    },

    /// Chat text relayed from a room member.
    Message { from: ConnectionId, message: String },

    /// Notice that the last inbound frame was rejected.
    Error { message: String },
}

impl ServerEnvelope {
    /// Builds the confirmation sent after a successful join.
    pub fn joined(room: &str, id: &ConnectionId) -> Self {
        ServerEnvelope::System {
            message: format!("You joined room {room} as {id}"),
            user_id: id.clone(),
        }
    }

    /// Builds a relayed chat message.
    pub fn chat(from: &ConnectionId, message: impl Into<String>) -> Self {
        ServerEnvelope::Message {
            from: from.clone(),
            message: message.into(),
        }
    }

    /// Builds an error notice.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEnvelope::Error {
            message: message.into(),
        }
    }
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEnvelope::System { .. } => "system",
            ServerEnvelope::Message { .. } => "message",
            ServerEnvelope::Error { .. } => "error",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
