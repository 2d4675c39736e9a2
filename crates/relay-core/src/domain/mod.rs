//! Domain layer: connections, the registry, and the room index.
//!
//! Nothing here performs I/O.  Outbound delivery goes through the
//! [`Transport`] trait so the same code runs against real sockets in the
//! server and against in-memory recorders in tests.

pub mod connection;
pub mod registry;
pub mod rooms;
pub mod transport;

pub use connection::{Connection, ConnectionId, Session};
pub use registry::{ConnectionRegistry, SessionRecord};
pub use rooms::{DeliveryReport, RoomBroadcaster};
pub use transport::{DeliveryError, Transport};
