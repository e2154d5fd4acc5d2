//! # chatcast - Broadcast Chat Server
//!
//! chatcast is a real-time chat server. Clients connect over WebSocket, pick a
//! display name, receive a color, and every message they send is relayed to
//! all connected clients. New clients get the most recent messages replayed on
//! join.
//!
//! ## Quick Start
//!
//! ```bash
//! chatcast --host 0.0.0.0 --port 1337
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use chatcast::hub::{Hub, HubConfig};
//! use chatcast::server::{ConnectionOptions, serve};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:1337").await?;
//! let hub = Hub::new(HubConfig::default());
//! serve(listener, hub, ConnectionOptions::default(), std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **[Identity Pool](identity)**: reusable display colors
//! - **[History Buffer](history)**: bounded log of recent messages
//! - **[Protocol](protocol)**: JSON frames and input sanitization
//! - **[Session](session)**: per-connection naming state machine
//! - **[Hub](hub)**: session registry, history and fan-out behind one lock
//! - **[Server](server)**: WebSocket listener and per-connection tasks
//!
//! ## Wire Protocol
//!
//! Clients send plain text: the first frame is their name, later frames are
//! messages. The server sends `{"type": "color" | "history" | "message" |
//! "error", "data": ...}`.

pub mod error;
pub mod history;
pub mod hub;
pub mod identity;
pub mod protocol;
pub mod server;
pub mod session;
