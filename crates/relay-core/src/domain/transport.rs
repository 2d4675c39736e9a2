//! Outbound transport abstraction.
//!
//! The core decides *who* receives a frame; a [`Transport`] decides *how* it
//! gets there.  The server crate implements this trait over a bounded channel
//! that feeds a WebSocket writer task, and tests implement it over a `Vec`.
//!
//! # Delivery contract
//!
//! - `send` must not block or await.  Delivery is fire-and-forget: the core
//!   calls it once per recipient and never retries.
//! - `is_open` reports whether the transport can currently accept a frame.
//!   Broadcasts skip recipients whose transport is not open.
//! - A transport may become closed at any time (the peer can disconnect while
//!   a broadcast is iterating).  `send` then returns an error instead of
//!   panicking.

use thiserror::Error;

/// Why a single frame could not be handed to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The transport is alive but cannot take another frame right now
    /// (for example its outbound queue is full).
    #[error("transport not ready")]
    NotReady,

    /// The transport has shut down; no further frames will be accepted.
    #[error("transport closed")]
    Closed,
}

/// One connection's outbound side.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Returns `true` while the transport accepts frames.
    fn is_open(&self) -> bool;

    /// Hands one encoded frame to the transport without waiting.
    fn send(&self, frame: &str) -> Result<(), DeliveryError>;
}
