#![allow(dead_code)]
//! Test harness utilities for chatcast integration tests.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chatcast::history::HistoryBuffer;
use chatcast::hub::Hub;
use chatcast::identity::{Color, IdentityPool};
use chatcast::protocol::ServerEvent;
use chatcast::server::{ConnectionOptions, serve};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Hub,
}

/// Start a server on an ephemeral port whose pool hands out `palette` in order.
pub async fn start_server(palette: &[&str]) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let pool = IdentityPool::ordered(palette.iter().map(|c| Color::from(*c)).collect());
    let hub = Hub::from_parts(pool, HistoryBuffer::default());

    tokio::spawn(serve(
        listener,
        hub.clone(),
        ConnectionOptions::default(),
        std::future::pending(),
    ));

    TestServer { addr, hub }
}

pub async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _response) = connect_async(format!("ws://{addr}/"))
        .await
        .expect("Failed to connect");
    ws
}

pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::Text(text.to_string().into()))
        .await
        .expect("Failed to send text frame");
}

/// Receive the next JSON event, skipping control frames.
pub async fn recv_event(ws: &mut WsClient) -> ServerEvent {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let msg = tokio::time::timeout(remaining, ws.next())
            .await
            .expect("Timed out waiting for event")
            .expect("Connection ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Invalid JSON frame");
            }
            Message::Close(_) => panic!("Connection closed while waiting for event"),
            _ => continue,
        }
    }
}

/// Assert the server closes the connection without sending further events.
pub async fn expect_closed(ws: &mut WsClient) {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, ws.next())
            .await
            .expect("Timed out waiting for close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("Unexpected event before close: {}", text),
            Some(Ok(_)) => continue,
        }
    }
}

/// Assert nothing arrives within `window`.
pub async fn expect_silence(ws: &mut WsClient, window: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(window, ws.next()).await {
        panic!("Expected silence, got {}", text);
    }
}

/// Poll the hub until it holds `expected` sessions, or timeout.
pub async fn wait_for_sessions(hub: &Hub, expected: usize) {
    let start = Instant::now();
    while start.elapsed() < RECV_TIMEOUT {
        if hub.stats().await.sessions == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "Timed out waiting for {} sessions (have {})",
        expected,
        hub.stats().await.sessions
    );
}

/// Connect, send `name`, and return the client with its assigned color.
/// A history replay arriving first is skipped.
pub async fn join_as(server: &TestServer, name: &str) -> (WsClient, Color) {
    let mut ws = connect(server.addr).await;
    send_text(&mut ws, name).await;
    loop {
        match recv_event(&mut ws).await {
            ServerEvent::Color(color) => return (ws, color),
            ServerEvent::History(_) => continue,
            other => panic!("Expected Color, got {:?}", other),
        }
    }
}
