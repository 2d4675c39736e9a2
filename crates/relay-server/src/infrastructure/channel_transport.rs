//! Channel-backed [`Transport`] for WebSocket connections.
//!
//! The relay core delivers frames synchronously while it holds the state lock,
//! so it must never wait on a socket.  Each connection therefore gets a
//! bounded `mpsc` queue: the core pushes frames with `try_send`, and a
//! dedicated writer task drains the queue into the WebSocket sink.
//!
//! ```text
//! RelayState ──try_send──▶ [ queue ] ──recv──▶ writer task ──▶ WebSocket
//! ```
//!
//! When the writer task ends (peer gone, write error), the receiver is
//! dropped and the transport reports itself closed.

use relay_core::{DeliveryError, Transport};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Outbound side of one WebSocket connection.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<WsMessage>,
}

impl ChannelTransport {
    /// Creates a transport with a queue of `capacity` frames, returning the
    /// receiving end for the writer task.
    ///
    /// A `capacity` of zero is raised to one (`mpsc::channel` panics on 0).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, frame: &str) -> Result<(), DeliveryError> {
        self.tx
            .try_send(WsMessage::Text(frame.to_owned()))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::NotReady,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
