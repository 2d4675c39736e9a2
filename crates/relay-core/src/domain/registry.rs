//! Connection registry: the authoritative connection → session mapping.
//!
//! Every accepted connection gets a record here for its whole lifetime.  The
//! record holds the connection handle and the single room the connection
//! currently belongs to (if any).
//!
//! The registry is a plain owned struct.  It is not internally synchronised;
//! the owner ([`RelayState`](crate::session::RelayState)) decides how it is
//! shared between tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::connection::{Connection, ConnectionId, Session};

/// A registry entry.  Returned from [`ConnectionRegistry::remove`] so the
/// caller can finish cleanup (leave the room) with the same handle.
#[derive(Debug)]
pub struct SessionRecord<T> {
    pub connection: Connection<T>,
    pub room: Option<String>,
}

impl<T> SessionRecord<T> {
    /// Returns a detached snapshot of this record.
    pub fn session(&self) -> Session {
        Session {
            id: self.connection.id().clone(),
            room: self.room.clone(),
        }
    }
}

/// Tracks every live connection and the room each one belongs to.
#[derive(Debug)]
pub struct ConnectionRegistry<T> {
    sessions: HashMap<ConnectionId, SessionRecord<T>>,
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<T> ConnectionRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection with no room and returns its identifier.
    pub fn register(&mut self, transport: Arc<T>) -> ConnectionId {
        self.register_with(transport, ConnectionId::generate)
    }

    /// Like [`register`](Self::register) but draws identifiers from
    /// `generate`.  Identifiers already held by a live connection are
    /// discarded and `generate` is called again.
    pub fn register_with<F>(&mut self, transport: Arc<T>, mut generate: F) -> ConnectionId
    where
        F: FnMut() -> ConnectionId,
    {
        let id = loop {
            let candidate = generate();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
            debug!(id = %candidate, "generated identifier already live; regenerating");
        };

        self.sessions.insert(
            id.clone(),
            SessionRecord {
                connection: Connection::new(id.clone(), transport),
                room: None,
            },
        );
        id
    }

    /// Sets the connection's room, returning the room it was in before.
    ///
    /// No-op (returns `None`) when `id` is not registered.
    pub fn assign_room(&mut self, id: &ConnectionId, room: impl Into<String>) -> Option<String> {
        let record = self.sessions.get_mut(id)?;
        record.room.replace(room.into())
    }

    /// Returns the connection's current session, or `None` if it is not
    /// registered (never accepted, or already removed).
    pub fn lookup(&self, id: &ConnectionId) -> Option<Session> {
        self.sessions.get(id).map(SessionRecord::session)
    }

    /// Returns a clone of the connection handle for `id`.
    pub fn connection(&self, id: &ConnectionId) -> Option<Connection<T>> {
        self.sessions.get(id).map(|r| r.connection.clone())
    }

    /// Deletes the record for `id` and hands it back.  Idempotent: a second
    /// call returns `None`.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<SessionRecord<T>> {
        self.sessions.remove(id)
    }

    /// Snapshots of every live session, in no particular order.
    pub fn sessions(&self) -> impl Iterator<Item = Session> + '_ {
        self.sessions.values().map(SessionRecord::session)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
