//! relay-server library crate.
//!
//! A WebSocket front end for `relay-core`.  Clients connect, join a room by
//! name, and every message they send is relayed to all members of that room.
//!
//! # Architecture
//!
//! ```text
//! Clients (JSON over WebSocket)
//!         ↕
//! [relay-server]
//!   ├── domain/            RelayConfig
//!   └── infrastructure/
//!         ├── ws_server/         accept loop + per-connection tasks
//!         ├── channel_transport/ bounded outbound queue per connection
//!         └── config_file/       optional TOML config
//!         ↕
//! [relay-core]  registry, rooms, protocol handler
//! ```

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Infrastructure layer: WebSocket server, transports, config file.
pub mod infrastructure;
