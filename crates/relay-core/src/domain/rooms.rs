//! Room membership index and fan-out delivery.
//!
//! # Room lifecycle
//!
//! Rooms are never configured up front.  A room comes into existence the
//! first time a connection joins it and disappears the moment its last member
//! leaves, so the index never holds an empty room:
//!
//! ```text
//! join("Red", A)   →  { "Red": {A} }
//! join("Red", B)   →  { "Red": {A, B} }
//! leave("Red", A)  →  { "Red": {B} }
//! leave("Red", B)  →  { }                  ← room deleted
//! ```
//!
//! # Fan-out policy
//!
//! [`RoomBroadcaster::broadcast`] delivers to *every* member of the room,
//! including the sender.  Clients recognise their own messages by comparing
//! the `from` identifier with the one they received on join.
//!
//! Members whose transport is not open are skipped.  Nothing is retried and a
//! skipped member is not an error.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::connection::{Connection, ConnectionId};
use crate::domain::transport::Transport;

/// Outcome of a single [`RoomBroadcaster::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Members whose transport accepted the frame.
    pub delivered: usize,
    /// Members that were not open, or whose transport refused the frame.
    pub skipped: usize,
}

impl DeliveryReport {
    /// Total members the broadcast looked at.
    pub fn attempted(&self) -> usize {
        self.delivered + self.skipped
    }
}

/// Maps room names to their member connections.
#[derive(Debug)]
pub struct RoomBroadcaster<T> {
    rooms: HashMap<String, HashMap<ConnectionId, Connection<T>>>,
}

impl<T> Default for RoomBroadcaster<T> {
    fn default() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }
}

impl<T> RoomBroadcaster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to `room`, creating the room if needed.
    ///
    /// Joining a room the connection is already in changes nothing.
    pub fn join(&mut self, room: &str, connection: &Connection<T>) {
        let members = self.rooms.entry(room.to_owned()).or_default();
        if !members.contains_key(connection.id()) {
            members.insert(connection.id().clone(), connection.clone());
            debug!(room, id = %connection.id(), members = members.len(), "joined room");
        }
    }

    /// Removes `id` from `room`, deleting the room once it is empty.
    ///
    /// No-op when the room or the member does not exist.
    pub fn leave(&mut self, room: &str, id: &ConnectionId) {
        let Some(members) = self.rooms.get_mut(room) else {
            return;
        };
        if members.remove(id).is_none() {
            return;
        }
        debug!(room, %id, members = members.len(), "left room");
        if members.is_empty() {
            self.rooms.remove(room);
            debug!(room, "room empty; removed");
        }
    }

    /// Returns `true` if the room currently exists (has at least one member).
    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Returns `true` if `id` is a member of `room`.
    pub fn is_member(&self, room: &str, id: &ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains_key(id))
    }

    /// Member identifiers of `room`, sorted for stable output.  Empty when the
    /// room does not exist.
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .rooms
            .get(room)
            .map(|members| members.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Names of all live rooms, sorted.
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl<T: Transport> RoomBroadcaster<T> {
    /// Sends `frame` to every member of `room` whose transport is open.
    ///
    /// `sender` is only used for logging: the sender receives its own message
    /// like any other member.  Broadcasting to a room that does not exist is a
    /// no-op and returns an empty report.  This happens legitimately when the
    /// room emptied out between a sender's lookup and the broadcast.
    pub fn broadcast(&self, room: &str, sender: &ConnectionId, frame: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        let Some(members) = self.rooms.get(room) else {
            debug!(room, %sender, "broadcast to missing room ignored");
            return report;
        };

        for (id, member) in members {
            let transport = member.transport();
            if !transport.is_open() {
                report.skipped += 1;
                continue;
            }
            match transport.send(frame) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(room, %id, error = %e, "skipped member during broadcast");
                    report.skipped += 1;
                }
            }
        }

        debug!(
            room,
            %sender,
            delivered = report.delivered,
            skipped = report.skipped,
            "broadcast complete"
        );
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
