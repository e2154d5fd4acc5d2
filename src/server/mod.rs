//! # Connection Listener
//!
//! Accepts WebSocket connections, turns each into a [`Session`] registered
//! with the [`Hub`], and pumps frames between the socket and the session.
//!
//! ## Per-connection tasks
//!
//! ```text
//!            ┌──────────── reader loop ────────────┐
//!  socket ──►│ text → Session::on_text → Hub       │
//!            └─────────────────────────────────────┘
//!            ┌──────────── writer task ────────────┐
//!  socket ◄──│ outbound queue ◄── Hub fan-out      │
//!            └─────────────────────────────────────┘
//! ```
//!
//! Whichever side finishes first ends the connection, then the session's
//! disconnect path runs. Every socket write is bounded by a send timeout, and
//! a failed or timed-out write counts as a disconnect (no retries).
//!
//! ## Endpoints
//! - `WS /` - chat connection
//! - `GET /api/stats` - hub counters
//!
//! The `Origin` header is logged but not validated, and there is no TLS.

use crate::error::{ChatError, ChatResult};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::hub::{Hub, HubConfig, HubStats};
use crate::identity::{Color, DEFAULT_PALETTE};
use crate::session::Session;
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "chatcast - broadcast chat server over WebSocket"
)]
pub struct Args {
    /// Host to bind the chat server to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the chat server
    #[arg(long, default_value_t = 1337)]
    pub port: u16,

    /// Number of recent messages replayed to new sessions
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    pub history_capacity: usize,

    /// Comma separated colors handed out to named sessions
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_PALETTE.map(String::from))]
    pub palette: Vec<String>,

    /// Frames queued per session before it is dropped as too slow
    #[arg(long, default_value_t = 256)]
    pub outbound_buffer: usize,

    /// Milliseconds a single socket write may take before the session is dropped
    #[arg(long, default_value_t = 5000)]
    pub send_timeout_ms: u64,
}

impl Args {
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            history_capacity: self.history_capacity,
            palette: self.palette.iter().map(|c| Color::from(c.as_str())).collect(),
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            outbound_buffer: self.outbound_buffer.max(1),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }
}

/// Per-connection transport settings
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    pub outbound_buffer: usize,
    pub send_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            send_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone)]
struct AppState {
    hub: Hub,
    options: ConnectionOptions,
}

/// Binds the chat endpoint and serves until Ctrl-C.
///
/// A bind failure is returned to the caller and is fatal for the process.
///
/// # Example
///
/// ```rust,no_run
/// use chatcast::server::{Args, run_chat_server};
/// use clap::Parser;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = Args::parse_from(["chatcast", "--port", "1337"]);
/// run_chat_server(args).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_chat_server(args: Args) -> Result<()> {
    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind chat server to {addr}"))?;

    info!("Server is listening on {}", addr);

    let hub = Hub::new(args.hub_config());
    serve(listener, hub, args.connection_options(), shutdown_signal()).await
}

/// Serves chat connections on an already bound listener until `shutdown`
/// resolves.
pub async fn serve<F>(
    listener: TcpListener,
    hub: Hub,
    options: ConnectionOptions,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = Router::new()
        .route("/", get(handle_chat_ws))
        .route("/api/stats", get(get_stats))
        .with_state(AppState { hub, options });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("chat server terminated")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn get_stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats().await)
}

async fn handle_chat_ws(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("<none>");
    info!("Connection from origin {} ({})", origin, remote);

    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, remote))
}

async fn handle_chat_socket(socket: WebSocket, state: AppState, remote: SocketAddr) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.options.outbound_buffer);

    let mut session = match Session::open(state.hub.clone(), outbound_tx).await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to register connection from {}: {}", remote, e);
            return;
        }
    };
    let session_id = session.id();
    info!("Connection accepted: session {} ({})", session_id, remote);

    let mut writer = tokio::spawn(write_outbound(
        ws_sender,
        outbound_rx,
        state.options.send_timeout,
        session_id,
    ));

    let reader = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = session.on_text(text.as_str()).await {
                        warn!("Closing session {}: {}", session_id, e);
                        break;
                    }
                }
                Ok(Message::Binary(data)) => {
                    debug!(
                        "Ignoring {} byte binary frame from session {}",
                        data.len(),
                        session_id
                    );
                }
                Ok(Message::Close(_)) => {
                    info!("Close message received for session: {}", session_id);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error for session {}: {}", session_id, e);
                    break;
                }
            }
        }
    };

    let writer_done = tokio::select! {
        _ = &mut writer => true,
        _ = reader => false,
    };

    session.close().await;
    // lets a rejection notice or close frame still reach the peer
    if !writer_done && timeout(state.options.send_timeout, &mut writer).await.is_err() {
        writer.abort();
    }

    info!("Peer {} disconnected (session {})", remote, session_id);
}

/// Drains the session's outbound queue into the socket.
///
/// Returns once the hub drops the queue (disconnect or eviction) or a write
/// fails; a closed queue is followed by a close frame.
async fn write_outbound(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
    send_timeout: Duration,
    session_id: uuid::Uuid,
) {
    while let Some(frame) = outbound_rx.recv().await {
        let msg = Message::Text(frame.to_string().into());
        if let Err(e) = send_frame(&mut ws_sender, msg, send_timeout).await {
            warn!("Dropping session {}: {}", session_id, e);
            return;
        }
    }
    let _ = send_frame(&mut ws_sender, Message::Close(None), send_timeout).await;
    debug!("Outbound queue closed for session: {}", session_id);
}

async fn send_frame(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    send_timeout: Duration,
) -> ChatResult<()> {
    match timeout(send_timeout, ws_sender.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ChatError::TransportFailure(e.to_string())),
        Err(_) => Err(ChatError::TransportFailure(format!(
            "write timed out after {} ms",
            send_timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_original_constants() {
        let args = Args::parse_from(["chatcast"]);
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 1337);

        let config = args.hub_config();
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.palette.len(), 7);
        assert_eq!(config.palette[0], Color::from("red"));
    }

    #[test]
    fn test_palette_is_comma_separated() {
        let args = Args::parse_from(["chatcast", "--palette", "teal,navy", "--outbound-buffer", "0"]);
        let config = args.hub_config();
        assert_eq!(config.palette, vec![Color::from("teal"), Color::from("navy")]);
        assert_eq!(args.connection_options().outbound_buffer, 1);
    }
}
