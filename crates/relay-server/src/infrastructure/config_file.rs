//! Optional TOML configuration file.
//!
//! The relay runs fine without a config file.  When one is named with
//! `--config` (or `RELAY_CONFIG`), its values sit between the built-in
//! defaults and the CLI/environment overrides.
//!
//! ```toml
//! log_level = "debug"
//!
//! [server]
//! bind_address = "127.0.0.1"
//! port = 9000
//! outbound_buffer = 128
//! max_frame_bytes = 32768
//! ```
//!
//! Every field is optional.  Fields absent from the file fall back to the
//! defaults in [`RelayConfig`](crate::domain::RelayConfig).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::config::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_OUTBOUND_BUFFER, DEFAULT_PORT};

/// Error type for config file loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Top-level config file contents.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// `tracing` filter used when `RUST_LOG` is not set, e.g. `"info"`.
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub server: ServerSection,
}

/// `[server]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Parses config file contents.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Reads and parses the config file at `path`.
///
/// Unlike a platform default location, an explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its contents are invalid.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
