//! Per-connection protocol state machine.
//!
//! # States
//!
//! ```text
//!              join{room}                       join{other}
//!  Unjoined ───────────────▶ Joined(room) ─────────────────▶ Joined(other)
//!     │                          │    ▲                          (leaves room first)
//!     │ message → dropped        │    └── message → broadcast to room
//!     │                          │
//!     └──────── disconnect ──────┴──────▶ Closed (registry + room cleanup)
//! ```
//!
//! Malformed frames never change state: the sender gets one `error` envelope
//! and the connection stays usable.  A `message` before any `join` is
//! dropped silently.
//!
//! The state itself is not stored separately.  A connection is Joined exactly
//! when its registry record has a room.

use tracing::{debug, info, warn};

use crate::domain::connection::{ConnectionId, Session};
use crate::domain::rooms::DeliveryReport;
use crate::domain::transport::{DeliveryError, Transport};
use crate::protocol::codec::{
    decode_client_bytes, decode_client_envelope, encode_server_envelope, ProtocolError,
};
use crate::protocol::envelope::{ClientEnvelope, ServerEnvelope};
use crate::session::state::RelayState;

/// Why an inbound envelope was accepted but had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `message` received before the connection joined a room.
    NotJoined,
    /// `message` whose text is the empty string.
    EmptyMessage,
    /// The connection is not (or no longer) registered.
    UnknownConnection,
}

/// What happened as a result of one inbound frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The connection is now in `room`.  `previous` is the room it left, if
    /// it moved from another room.
    Joined {
        room: String,
        previous: Option<String>,
    },
    /// A chat message was fanned out to `room`.
    Broadcast { room: String, report: DeliveryReport },
    /// The envelope was valid but ignored.
    Dropped(DropReason),
    /// The frame was rejected and an `error` envelope was sent back.
    Rejected(ProtocolError),
}

impl<T: Transport> RelayState<T> {
    /// Registers a newly accepted connection (state: Unjoined).
    pub fn connect(&mut self, transport: std::sync::Arc<T>) -> ConnectionId {
        let id = self.registry.register(transport);
        info!(%id, connections = self.registry.len(), "connection registered");
        id
    }

    /// Processes one inbound text frame from `id`.
    pub fn handle_frame(&mut self, id: &ConnectionId, frame: &str) -> FrameOutcome {
        match decode_client_envelope(frame) {
            Ok(envelope) => self.handle_envelope(id, envelope),
            Err(e) => self.reject(id, e),
        }
    }

    /// Processes one inbound binary frame from `id` (decoded as UTF-8 text).
    pub fn handle_bytes(&mut self, id: &ConnectionId, frame: &[u8]) -> FrameOutcome {
        match decode_client_bytes(frame) {
            Ok(envelope) => self.handle_envelope(id, envelope),
            Err(e) => self.reject(id, e),
        }
    }

    /// Applies a decoded envelope to the connection's state.
    pub fn handle_envelope(&mut self, id: &ConnectionId, envelope: ClientEnvelope) -> FrameOutcome {
        debug!(%id, kind = envelope.kind(), "inbound envelope");
        match envelope {
            ClientEnvelope::Join { room } => self.join(id, room),
            ClientEnvelope::Message { message } => self.relay(id, message),
        }
    }

    /// Tears down a connection (state: Closed).
    ///
    /// Removes the registry record and, if the connection had joined a room,
    /// removes it from that room.  Safe to call more than once.
    pub fn disconnect(&mut self, id: &ConnectionId) -> Option<Session> {
        let record = self.registry.remove(id)?;
        if let Some(room) = &record.room {
            self.rooms.leave(room, record.connection.id());
        }
        let session = record.session();
        info!(
            %id,
            room = session.room.as_deref().unwrap_or("-"),
            connections = self.registry.len(),
            "connection closed"
        );
        Some(session)
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    fn join(&mut self, id: &ConnectionId, room: String) -> FrameOutcome {
        let Some(connection) = self.registry.connection(id) else {
            return FrameOutcome::Dropped(DropReason::UnknownConnection);
        };

        let previous = self.registry.assign_room(id, room.clone());
        if let Some(old) = previous.as_deref() {
            if old != room {
                self.rooms.leave(old, id);
            }
        }
        self.rooms.join(&room, &connection);

        self.reply(id, &ServerEnvelope::joined(&room, id));
        info!(%id, %room, previous = previous.as_deref().unwrap_or("-"), "joined room");

        FrameOutcome::Joined {
            previous: previous.filter(|old| *old != room),
            room,
        }
    }

    fn relay(&mut self, id: &ConnectionId, message: String) -> FrameOutcome {
        let Some(session) = self.registry.lookup(id) else {
            return FrameOutcome::Dropped(DropReason::UnknownConnection);
        };
        let Some(room) = session.room else {
            debug!(%id, "message before join dropped");
            return FrameOutcome::Dropped(DropReason::NotJoined);
        };
        if message.is_empty() {
            return FrameOutcome::Dropped(DropReason::EmptyMessage);
        }

        // Encode once; every member receives the same frame.
        let frame = match encode_server_envelope(&ServerEnvelope::chat(id, message)) {
            Ok(frame) => frame,
            Err(e) => return self.reject(id, e),
        };
        let report = self.rooms.broadcast(&room, id, &frame);
        FrameOutcome::Broadcast { room, report }
    }

    fn reject(&mut self, id: &ConnectionId, error: ProtocolError) -> FrameOutcome {
        warn!(%id, %error, "rejected inbound frame");
        self.reply(id, &ServerEnvelope::error(error.to_string()));
        FrameOutcome::Rejected(error)
    }

    /// Sends one envelope to `id` alone.  Failures are logged and dropped.
    fn reply(&self, id: &ConnectionId, envelope: &ServerEnvelope) {
        let Some(connection) = self.registry.connection(id) else {
            return;
        };
        let transport = connection.transport();
        if !transport.is_open() {
            debug!(%id, "reply skipped; transport not open");
            return;
        }
        let frame = match encode_server_envelope(envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%id, error = %e, "failed to encode reply");
                return;
            }
        };
        match transport.send(&frame) {
            Ok(()) => {}
            // The client misses this reply, which may be its join confirmation.
            Err(DeliveryError::NotReady) => {
                warn!(%id, kind = envelope.kind(), "reply dropped; outbound queue full");
            }
            Err(e) => debug!(%id, error = %e, "reply not delivered"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    /// Transport that records every frame it accepts.
    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<String>>,
        closed: std::sync::atomic::AtomicBool,
    }

    impl Recorder {
        fn take(&self) -> Vec<Value> {
            self.frames
                .lock()
                .unwrap()
                .drain(..)
                .map(|f| serde_json::from_str(&f).unwrap())
                .collect()
        }

        fn close(&self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl Transport for Recorder {
        fn is_open(&self) -> bool {
            !self.closed.load(std::sync::atomic::Ordering::SeqCst)
        }

        fn send(&self, frame: &str) -> Result<(), DeliveryError> {
            if !self.is_open() {
                return Err(DeliveryError::Closed);
            }
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    fn connect(state: &mut RelayState<Recorder>) -> (ConnectionId, Arc<Recorder>) {
        let transport = Arc::new(Recorder::default());
        let id = state.connect(Arc::clone(&transport));
        (id, transport)
    }

    #[test]
    fn test_join_sends_system_confirmation_with_identifier() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);

        // Assert
        assert!(matches!(outcome, FrameOutcome::Joined { ref room, previous: None } if room == "Red"));
        let frames = a_rx.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "system");
        assert_eq!(frames[0]["userId"], a.as_str());
        assert_eq!(
            frames[0]["message"],
            format!("You joined room Red as {a}").as_str()
        );
        assert!(state.rooms().is_member("Red", &a));
        assert!(state.membership_consistent());
    }

    #[test]
    fn test_message_before_join_is_dropped_silently() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);

        let outcome = state.handle_frame(&a, r#"{"type":"message","message":"hi"}"#);

        assert!(matches!(outcome, FrameOutcome::Dropped(DropReason::NotJoined)));
        assert!(a_rx.take().is_empty(), "no error is reported for state violations");
    }

    #[test]
    fn test_message_is_echoed_to_sender_and_peers() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        let (b, b_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        state.handle_frame(&b, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();
        b_rx.take();

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"message","message":"hi"}"#);

        // Assert
        match outcome {
            FrameOutcome::Broadcast { room, report } => {
                assert_eq!(room, "Red");
                assert_eq!(report.delivered, 2);
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
        for frames in [a_rx.take(), b_rx.take()] {
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["type"], "message");
            assert_eq!(frames[0]["from"], a.as_str());
            assert_eq!(frames[0]["message"], "hi");
        }
    }

    #[test]
    fn test_empty_message_is_dropped() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();

        let outcome = state.handle_frame(&a, r#"{"type":"message","message":""}"#);

        assert!(matches!(outcome, FrameOutcome::Dropped(DropReason::EmptyMessage)));
        assert!(a_rx.take().is_empty());
    }

    #[test]
    fn test_whitespace_message_is_relayed_to_every_member() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        let (b, b_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        state.handle_frame(&b, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();
        b_rx.take();

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"message","message":"  "}"#);

        // Assert
        match outcome {
            FrameOutcome::Broadcast { room, report } => {
                assert_eq!(room, "Red");
                assert_eq!(report, DeliveryReport { delivered: 2, skipped: 0 });
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
        for frames in [a_rx.take(), b_rx.take()] {
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0]["from"], a.as_str());
            assert_eq!(frames[0]["message"], "  ");
        }
    }

    #[test]
    fn test_whitespace_room_is_joinable_and_distinct() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        let (b, b_rx) = connect(&mut state);
        state.handle_frame(&b, r#"{"type":"join","room":"  "}"#);
        b_rx.take();

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"join","room":" "}"#);
        state.handle_frame(&a, r#"{"type":"message","message":"hi"}"#);

        // Assert
        assert!(matches!(outcome, FrameOutcome::Joined { ref room, previous: None } if room == " "));
        let frames = a_rx.take();
        assert_eq!(frames[0]["type"], "system");
        assert_eq!(frames[0]["message"], format!("You joined room   as {a}").as_str());
        assert_eq!(frames[1]["message"], "hi");
        assert_eq!(state.rooms().members(" "), vec![a.clone()]);
        assert_eq!(state.rooms().members("  "), vec![b.clone()]);
        assert!(b_rx.take().is_empty(), "room \"  \" is not room \" \"");
        assert!(state.membership_consistent());
    }

    #[test]
    fn test_empty_room_is_rejected_without_state_change() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);

        let outcome = state.handle_frame(&a, r#"{"type":"join","room":""}"#);

        assert!(matches!(outcome, FrameOutcome::Rejected(ProtocolError::EmptyRoom)));
        let frames = a_rx.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["message"], "Room name must not be empty");
        assert!(state.registry().lookup(&a).unwrap().room.is_none());
        assert_eq!(state.rooms().room_count(), 0);
    }

    #[test]
    fn test_malformed_frame_yields_single_error_and_keeps_room() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();

        // Act
        let outcome = state.handle_frame(&a, "not json at all");

        // Assert
        assert!(matches!(outcome, FrameOutcome::Rejected(ProtocolError::Malformed(_))));
        let frames = a_rx.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "error");
        assert_eq!(frames[0]["message"], "Invalid message format");
        assert_eq!(
            state.registry().lookup(&a).unwrap().room.as_deref(),
            Some("Red")
        );
    }

    #[test]
    fn test_message_missing_text_is_rejected() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);

        let outcome = state.handle_frame(&a, r#"{"type":"message"}"#);

        assert!(matches!(outcome, FrameOutcome::Rejected(ProtocolError::InvalidEnvelope(_))));
        let frames = a_rx.take();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "error");
        assert!(state.registry().lookup(&a).unwrap().room.is_none());
    }

    #[test]
    fn test_invalid_utf8_binary_frame_is_rejected() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);

        let outcome = state.handle_bytes(&a, &[0xc3, 0x28]);

        assert!(matches!(outcome, FrameOutcome::Rejected(_)));
        assert_eq!(a_rx.take()[0]["type"], "error");
    }

    #[test]
    fn test_binary_json_frame_is_handled_like_text() {
        let mut state = RelayState::new();
        let (a, _a_rx) = connect(&mut state);

        let outcome = state.handle_bytes(&a, br#"{"type":"join","room":"Red"}"#);

        assert!(matches!(outcome, FrameOutcome::Joined { .. }));
    }

    #[test]
    fn test_rejoin_moves_connection_to_new_room() {
        // Arrange
        let mut state = RelayState::new();
        let (a, _a_rx) = connect(&mut state);
        let (b, _b_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        state.handle_frame(&b, r#"{"type":"join","room":"Red"}"#);

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"join","room":"Blue"}"#);

        // Assert: A left Red (which survives through B) and is now in Blue only
        match outcome {
            FrameOutcome::Joined { room, previous } => {
                assert_eq!(room, "Blue");
                assert_eq!(previous.as_deref(), Some("Red"));
            }
            other => panic!("expected Joined, got {other:?}"),
        }
        assert!(!state.rooms().is_member("Red", &a));
        assert!(state.rooms().is_member("Blue", &a));
        assert_eq!(state.rooms().members("Red"), vec![b.clone()]);
        assert!(state.membership_consistent());
    }

    #[test]
    fn test_rejoin_from_sole_member_deletes_old_room() {
        let mut state = RelayState::new();
        let (a, _a_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);

        state.handle_frame(&a, r#"{"type":"join","room":"Blue"}"#);

        assert!(!state.rooms().contains_room("Red"));
        assert_eq!(state.rooms().room_names(), vec!["Blue".to_string()]);
    }

    #[test]
    fn test_rejoin_same_room_is_idempotent_and_reconfirms() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();

        let outcome = state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);

        assert!(matches!(outcome, FrameOutcome::Joined { previous: None, .. }));
        assert_eq!(state.rooms().members("Red"), vec![a.clone()]);
        assert_eq!(a_rx.take()[0]["type"], "system");
    }

    #[test]
    fn test_disconnect_cleans_registry_and_room() {
        // Arrange
        let mut state = RelayState::new();
        let (a, _a_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);

        // Act
        let session = state.disconnect(&a).expect("first disconnect returns the session");
        let again = state.disconnect(&a);

        // Assert
        assert_eq!(session.room.as_deref(), Some("Red"));
        assert!(again.is_none());
        assert!(state.registry().is_empty());
        assert!(!state.rooms().contains_room("Red"));
    }

    #[test]
    fn test_frames_after_disconnect_are_dropped() {
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        state.disconnect(&a);

        let join = state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        let msg = state.handle_frame(&a, r#"{"type":"message","message":"hi"}"#);

        assert!(matches!(join, FrameOutcome::Dropped(DropReason::UnknownConnection)));
        assert!(matches!(msg, FrameOutcome::Dropped(DropReason::UnknownConnection)));
        assert!(!state.rooms().contains_room("Red"));
        assert!(a_rx.take().is_empty());
    }

    #[test]
    fn test_broadcast_skips_member_whose_transport_closed() {
        // Arrange
        let mut state = RelayState::new();
        let (a, a_rx) = connect(&mut state);
        let (b, b_rx) = connect(&mut state);
        state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);
        state.handle_frame(&b, r#"{"type":"join","room":"Red"}"#);
        a_rx.take();
        b_rx.take();
        b_rx.close();

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"message","message":"hi"}"#);

        // Assert
        match outcome {
            FrameOutcome::Broadcast { report, .. } => {
                assert_eq!(report, DeliveryReport { delivered: 1, skipped: 1 });
            }
            other => panic!("expected Broadcast, got {other:?}"),
        }
        assert!(b_rx.take().is_empty());
    }

    /// Open transport whose outbound queue is always full.
    struct Saturated;

    impl Transport for Saturated {
        fn is_open(&self) -> bool {
            true
        }

        fn send(&self, _frame: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::NotReady)
        }
    }

    #[test]
    fn test_join_completes_when_confirmation_hits_full_queue() {
        // Arrange
        let mut state = RelayState::new();
        let a = state.connect(Arc::new(Saturated));

        // Act
        let outcome = state.handle_frame(&a, r#"{"type":"join","room":"Red"}"#);

        // Assert: the undelivered reply does not undo the join
        assert!(matches!(outcome, FrameOutcome::Joined { ref room, .. } if room == "Red"));
        assert!(state.rooms().is_member("Red", &a));
        assert_eq!(
            state.registry().lookup(&a).unwrap().room.as_deref(),
            Some("Red")
        );
        assert!(state.membership_consistent());
    }
}
