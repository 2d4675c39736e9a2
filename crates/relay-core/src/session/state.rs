//! The relay's shared state: one registry plus one room index.
//!
//! Both maps live in a single owned struct so that every protocol operation
//! updates them together.  Whoever holds `&mut RelayState` can never observe
//! the registry and the room index disagreeing about a connection's room.
//!
//! `RelayState` is not synchronised on its own.  The server wraps it in an
//! async mutex and holds the lock for exactly one handler call; a
//! single-threaded caller can use it directly.

use crate::domain::registry::ConnectionRegistry;
use crate::domain::rooms::RoomBroadcaster;

/// Owner of the connection registry and the room broadcaster.
#[derive(Debug)]
pub struct RelayState<T> {
    pub(crate) registry: ConnectionRegistry<T>,
    pub(crate) rooms: RoomBroadcaster<T>,
}

impl<T> Default for RelayState<T> {
    fn default() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomBroadcaster::new(),
        }
    }
}

impl<T> RelayState<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the registry.
    pub fn registry(&self) -> &ConnectionRegistry<T> {
        &self.registry
    }

    /// Read-only view of the room index.
    pub fn rooms(&self) -> &RoomBroadcaster<T> {
        &self.rooms
    }

    /// Checks that the registry and room index agree.
    ///
    /// Holds when every connection with a room assignment is a member of that
    /// room, and every room member is registered with that room as its
    /// assignment.  Empty rooms never exist in the index, so they need no
    /// separate check.
    pub fn membership_consistent(&self) -> bool {
        let assigned_are_members = self.registry.sessions().all(|session| match &session.room {
            Some(room) => self.rooms.is_member(room, &session.id),
            None => true,
        });

        let members_are_assigned = self.rooms.room_names().iter().all(|room| {
            self.rooms.members(room).iter().all(|id| {
                self.registry
                    .lookup(id)
                    .is_some_and(|s| s.room.as_deref() == Some(room.as_str()))
            })
        });

        assigned_are_members && members_are_assigned
    }
}
