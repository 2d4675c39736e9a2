//! Room relay WebSocket server: entry point.
//!
//! # Usage
//!
//! ```text
//! relay-server [OPTIONS]
//!
//! Options:
//!   --bind            <IP>    Listener IP address        [default: 0.0.0.0]
//!   --port            <PORT>  Listener port              [default: 8080]
//!   --outbound-buffer <N>     Per-connection send queue  [default: 64]
//!   --max-frame-bytes <N>     Largest inbound message    [default: 65536]
//!   --config          <PATH>  Optional TOML config file
//! ```
//!
//! # Precedence
//!
//! CLI flag, then environment variable, then config file, then built-in
//! default.
//!
//! | Variable                | Flag                |
//! |-------------------------|---------------------|
//! | `RELAY_BIND`            | `--bind`            |
//! | `RELAY_PORT`            | `--port`            |
//! | `RELAY_OUTBOUND_BUFFER` | `--outbound-buffer` |
//! | `RELAY_MAX_FRAME_BYTES` | `--max-frame-bytes` |
//! | `RELAY_CONFIG`          | `--config`          |
//!
//! Log verbosity comes from `RUST_LOG`, falling back to the config file's
//! `log_level`, then `info`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use relay_server::domain::RelayConfig;
use relay_server::infrastructure::{load_config, run_server, FileConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time room relay over WebSocket.
#[derive(Debug, Parser)]
#[command(
    name = "relay-server",
    about = "WebSocket relay that broadcasts chat messages to named rooms",
    version
)]
struct Cli {
    /// IP address to bind the WebSocket listener to.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket listener.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Frames queued per connection before broadcasts to it are skipped.
    #[arg(long, env = "RELAY_OUTBOUND_BUFFER")]
    outbound_buffer: Option<usize>,

    /// Largest inbound WebSocket message in bytes.
    #[arg(long, env = "RELAY_MAX_FRAME_BYTES")]
    max_frame_bytes: Option<usize>,

    /// Path to a TOML config file.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file named by `--config`, or an all-defaults file
    /// config when none was given.
    fn file_config(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(FileConfig::default()),
        }
    }

    /// Merges CLI values over `file` into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bind address is not a valid IP address.
    fn into_relay_config(self, file: &FileConfig) -> anyhow::Result<RelayConfig> {
        let bind = self.bind.unwrap_or_else(|| file.server.bind_address.clone());
        let ip: IpAddr = bind
            .parse()
            .with_context(|| format!("invalid bind address: '{bind}'"))?;
        let port = self.port.unwrap_or(file.server.port);

        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, port),
            outbound_buffer: self.outbound_buffer.unwrap_or(file.server.outbound_buffer),
            max_frame_bytes: self.max_frame_bytes.unwrap_or(file.server.max_frame_bytes),
        })
    }
}

fn init_tracing(file: &FileConfig) {
    let fallback = file.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.file_config()?;
    init_tracing(&file);

    let config = cli.into_relay_config(&file)?;
    info!(
        "room relay starting: bind={}, outbound_buffer={}, max_frame_bytes={}",
        config.bind_addr, config.outbound_buffer, config.max_frame_bytes
    );

    // Cleared by the Ctrl+C handler; the accept loop polls it.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("room relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_server::infrastructure::config_file::parse_config;

    #[test]
    fn test_cli_without_flags_uses_defaults() {
        // Arrange
        let cli = Cli::parse_from(["relay-server"]);

        // Act
        let config = cli.into_relay_config(&FileConfig::default()).unwrap();

        // Assert
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["relay-server", "--port", "9999"]);
        let config = cli.into_relay_config(&FileConfig::default()).unwrap();
        assert_eq!(config.bind_addr.port(), 9999);
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["relay-server", "--bind", "127.0.0.1"]);
        let config = cli.into_relay_config(&FileConfig::default()).unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_cli_ipv6_bind() {
        let cli = Cli::parse_from(["relay-server", "--bind", "::1", "--port", "1234"]);
        let config = cli.into_relay_config(&FileConfig::default()).unwrap();
        assert_eq!(config.bind_addr.to_string(), "[::1]:1234");
    }

    #[test]
    fn test_file_values_apply_when_cli_is_silent() {
        // Arrange
        let file = parse_config("[server]\nport = 7000\noutbound_buffer = 5\n").unwrap();
        let cli = Cli::parse_from(["relay-server"]);

        // Act
        let config = cli.into_relay_config(&file).unwrap();

        // Assert
        assert_eq!(config.bind_addr.port(), 7000);
        assert_eq!(config.outbound_buffer, 5);
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = parse_config("[server]\nport = 7000\nmax_frame_bytes = 10\n").unwrap();
        let cli = Cli::parse_from(["relay-server", "--port", "7001", "--max-frame-bytes", "20"]);

        let config = cli.into_relay_config(&file).unwrap();

        assert_eq!(config.bind_addr.port(), 7001);
        assert_eq!(config.max_frame_bytes, 20);
    }

    #[test]
    fn test_invalid_bind_address_returns_error() {
        let cli = Cli {
            bind: Some("not.an.ip".to_string()),
            port: None,
            outbound_buffer: None,
            max_frame_bytes: None,
            config: None,
        };

        let result = cli.into_relay_config(&FileConfig::default());

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["relay-server", "--config", "/no/such/relay.toml"]);
        assert!(cli.file_config().is_err());
    }
}
