//! Domain layer for relay-server: plain configuration types with no I/O.

pub mod config;

pub use config::RelayConfig;
