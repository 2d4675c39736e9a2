//! Infrastructure layer for relay-server.
//!
//! Everything that touches the outside world lives here: the TCP listener
//! and WebSocket upgrade, the per-connection outbound queue, and reading the
//! config file from disk.
//!
//! Protocol rules and room bookkeeping are *not* here; they live in
//! `relay-core` and are driven through [`RelayState`](relay_core::RelayState).

pub mod channel_transport;
pub mod config_file;
pub mod ws_server;

pub use channel_transport::ChannelTransport;
pub use config_file::{load_config, ConfigError, FileConfig};
pub use ws_server::{run_server, RelayServer, SharedState};
