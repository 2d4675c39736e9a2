//! Connection identity and session snapshots.
//!
//! A *connection* is one client's long-lived channel to the relay.  The core
//! never touches sockets directly: it sees a connection as a [`ConnectionId`]
//! plus a shared handle to something implementing
//! [`Transport`](crate::domain::transport::Transport).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix used for every generated identifier.
pub const ID_PREFIX: &str = "user-";

/// Number of hex characters taken from a random UUID after the prefix.
const ID_SUFFIX_LEN: usize = 6;

// ── ConnectionId ──────────────────────────────────────────────────────────────

/// Identifier assigned to a connection when it is accepted.
///
/// The identifier is also the `userId` shown to clients, so it doubles as the
/// sender tag on relayed messages.  It has the form `user-` followed by six
/// lowercase hex characters, e.g. `user-3fa85f`.
///
/// Six hex characters give roughly 16 million values, which is plenty for a
/// single relay, but collisions are possible.  The
/// [`ConnectionRegistry`](crate::domain::registry::ConnectionRegistry)
/// regenerates an identifier that clashes with a live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("{ID_PREFIX}{}", &uuid[..ID_SUFFIX_LEN]))
    }

    /// Wraps an existing identifier string (used by tests and tooling).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Connection handle ─────────────────────────────────────────────────────────

/// A connection as seen by the core: its identifier and its outbound transport.
///
/// Cloning is cheap (the transport is behind an `Arc`).  The registry owns the
/// authoritative copy; the broadcaster keeps clones in each room's member set so
/// fan-out does not need a registry lookup per member.
#[derive(Debug)]
pub struct Connection<T> {
    id: ConnectionId,
    transport: Arc<T>,
}

impl<T> Connection<T> {
    pub fn new(id: ConnectionId, transport: Arc<T>) -> Self {
        Self { id, transport }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}

// Manual impl: `#[derive(Clone)]` would require `T: Clone`.
impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

// ── Session snapshot ──────────────────────────────────────────────────────────

/// Server-side state of a connection at one point in time.
///
/// Returned by value from registry lookups so callers never hold a borrow into
/// the registry's map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The connection's identifier.
    pub id: ConnectionId,
    /// The room the connection currently belongs to, if it has joined one.
    pub room: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
