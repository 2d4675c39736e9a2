//! # relay-core
//!
//! The state-management heart of the room relay: who is connected, which
//! room each connection is in, and how a chat message fans out to a room.
//!
//! Clients hold one long-lived connection each.  After connecting they send a
//! `join` envelope naming a room, then `message` envelopes that are relayed
//! to every member of that room (the sender included).  Rooms exist only
//! while they have members.
//!
//! # Layout
//!
//! - **`domain`** – [`ConnectionRegistry`] (connection → session) and
//!   [`RoomBroadcaster`] (room → members, fan-out), plus the [`Transport`]
//!   trait that abstracts a connection's outbound side.
//! - **`protocol`** – the JSON envelopes and their codec.
//! - **`session`** – [`RelayState`], which owns both maps, and the protocol
//!   handler (`connect`, `handle_frame`, `disconnect`).
//!
//! This crate has no async runtime and no sockets.  The `relay-server` crate
//! supplies both.
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use relay_core::{DeliveryError, RelayState, Transport};
//!
//! #[derive(Default)]
//! struct Inbox(Mutex<Vec<String>>);
//!
//! impl Transport for Inbox {
//!     fn is_open(&self) -> bool { true }
//!     fn send(&self, frame: &str) -> Result<(), DeliveryError> {
//!         self.0.lock().unwrap().push(frame.to_string());
//!         Ok(())
//!     }
//! }
//!
//! let mut state = RelayState::new();
//! let inbox = Arc::new(Inbox::default());
//! let id = state.connect(Arc::clone(&inbox));
//! state.handle_frame(&id, r#"{"type":"join","room":"Red"}"#);
//! state.handle_frame(&id, r#"{"type":"message","message":"hi"}"#);
//!
//! let frames = inbox.0.lock().unwrap();
//! assert_eq!(frames.len(), 2); // join confirmation + own echo
//! ```

pub mod domain;
pub mod protocol;
pub mod session;

pub use domain::{
    Connection, ConnectionId, ConnectionRegistry, DeliveryError, DeliveryReport, RoomBroadcaster,
    Session, Transport,
};
pub use protocol::{ClientEnvelope, ProtocolError, ServerEnvelope};
pub use session::{DropReason, FrameOutcome, RelayState};
