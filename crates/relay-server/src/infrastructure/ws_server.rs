//! WebSocket server: accept loop and per-connection session tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting connections and upgrading each one to a WebSocket.
//! 3. Registering each connection with the shared [`RelayState`].
//! 4. Running two tasks per connection:
//!    - **Reader**: feeds inbound frames to the protocol handler, strictly in
//!      arrival order.
//!    - **Writer**: drains the connection's outbound queue into the socket.
//! 5. Cleaning up registry and room membership when the connection ends.
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! # Locking
//!
//! All connections share one `tokio::sync::Mutex<RelayState>`.  The lock is
//! held for exactly one handler call (one frame, one connect, or one
//! disconnect).  Handler calls never await, and fan-out only enqueues, so the
//! lock is never held across socket I/O.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use relay_core::{FrameOutcome, RelayState};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::domain::config::RelayConfig;
use crate::infrastructure::channel_transport::ChannelTransport;

/// Relay state shared by every connection task.
pub type SharedState = Arc<Mutex<RelayState<ChannelTransport>>>;

/// How often the accept loop re-checks the `running` flag when idle.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Server ────────────────────────────────────────────────────────────────────

/// A bound relay server, ready to accept connections.
///
/// Binding and running are separate steps so callers (and tests) can bind to
/// port 0 and read the real address before the accept loop starts.
pub struct RelayServer {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    state: SharedState,
}

impl RelayServer {
    /// Binds the WebSocket listener on `config.bind_addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is in use or cannot be bound.
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(RelayState::new())),
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the shared relay state.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Accepts connections until `running` is set to `false`.
    ///
    /// Each connection runs in its own task; a failing connection never
    /// affects the accept loop or other connections.  Connections already
    /// open when the loop stops are left to finish on their own.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let RelayServer {
            listener,
            config,
            state,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!("relay listening on ws://{addr}");
        }

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            // Short timeout so the loop notices the shutdown flag while idle.
            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!("accepted TCP connection from {peer}");
                    let config = Arc::clone(&config);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        handle_connection(stream, peer, config, state).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. too many open files); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }

        Ok(())
    }
}

/// Binds and runs a relay server in one call.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    RelayServer::bind(config).await?.run(running).await
}

// ── Per-connection session ────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<RelayConfig>,
    state: SharedState,
) {
    match run_session(stream, peer, config, state).await {
        Ok(()) => debug!("connection {peer} closed normally"),
        Err(e) => warn!("connection {peer} closed with error: {e:#}"),
    }
}

/// Runs one connection from WebSocket handshake to cleanup.
///
/// # Errors
///
/// Returns an error only if the WebSocket handshake fails.  Errors after the
/// handshake end the session and are logged; cleanup always runs.
async fn run_session(
    raw_stream: TcpStream,
    peer: SocketAddr,
    config: Arc<RelayConfig>,
    state: SharedState,
) -> anyhow::Result<()> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_frame_bytes);
    ws_config.max_frame_size = Some(config.max_frame_bytes);

    let ws_stream = accept_async_with_config(raw_stream, Some(ws_config))
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer}"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (transport, mut outbound) = ChannelTransport::channel(config.outbound_buffer);

    let id = state.lock().await.connect(Arc::new(transport));
    info!(%id, %peer, "client connected");

    // Writer: ends when every transport handle is dropped (after disconnect)
    // or when the socket refuses a write.
    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!(id = %writer_id, "WebSocket send failed: {e}");
                return;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(%id, "writer ended; closing session");
                break;
            }
            inbound = ws_rx.next() => {
                let message = match inbound {
                    Some(Ok(message)) => message,
                    Some(Err(e)) if is_clean_close(&e) => {
                        debug!(%id, "WebSocket closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(%id, "WebSocket error: {e}");
                        break;
                    }
                    None => {
                        debug!(%id, "WebSocket stream ended");
                        break;
                    }
                };

                let outcome = match message {
                    WsMessage::Text(text) => state.lock().await.handle_frame(&id, &text),
                    WsMessage::Binary(bytes) => state.lock().await.handle_bytes(&id, &bytes),
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
                    WsMessage::Close(_) => {
                        debug!(%id, "Close frame received");
                        break;
                    }
                };
                log_outcome(&id, &outcome);
            }
        }
    }

    // Dropping the removed record releases the last transport handles, which
    // lets the writer drain its queue and close the socket.
    let session = state.lock().await.disconnect(&id);
    let room = session
        .and_then(|s| s.room)
        .unwrap_or_else(|| "-".to_string());
    info!(%id, %peer, %room, "client disconnected");

    Ok(())
}

/// Errors that only mean the socket is already gone.  Anything else,
/// protocol violations included, is reported as a failure.
fn is_clean_close(error: &WsError) -> bool {
    matches!(error, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

fn log_outcome(id: &relay_core::ConnectionId, outcome: &FrameOutcome) {
    match outcome {
        FrameOutcome::Broadcast { room, report } => debug!(
            %id,
            %room,
            delivered = report.delivered,
            skipped = report.skipped,
            "relayed message"
        ),
        FrameOutcome::Dropped(reason) => debug!(%id, ?reason, "envelope dropped"),
        FrameOutcome::Joined { .. } | FrameOutcome::Rejected(_) => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
