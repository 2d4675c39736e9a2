//! Relay runtime configuration.
//!
//! [`RelayConfig`] is the single source of truth for runtime settings.  It is
//! built once in `main.rs` from CLI arguments, environment variables, and an
//! optional config file, then shared read-only by every connection task.

use std::net::{Ipv4Addr, SocketAddr};

/// Port clients connect to unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8080;

/// Frames queued per connection before further broadcasts to it are skipped.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Largest inbound WebSocket message accepted, in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// All runtime configuration for the relay server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    ///
    /// `0.0.0.0` accepts connections on every interface; use `127.0.0.1` to
    /// accept only local clients.
    pub bind_addr: SocketAddr,

    /// Depth of each connection's outbound queue.
    ///
    /// Broadcasts never wait for a slow client.  When a client's queue is
    /// full, it is treated as not ready and skipped for that message.
    pub outbound_buffer: usize,

    /// Maximum size of one inbound message.  Larger messages end the
    /// connection at the WebSocket layer.
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    /// | Field           | Default        |
    /// |-----------------|----------------|
    /// | bind_addr       | `0.0.0.0:8080` |
    /// | outbound_buffer | 64             |
    /// | max_frame_bytes | 65536          |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
