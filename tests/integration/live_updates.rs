// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for live-update fan-out over real WebSockets.
//!
//! Starts the real gateway, connects WebSocket subscribers with
//! tokio-tungstenite, saves task lists over HTTP, and verifies:
//! - every currently-connected subscriber receives the update event
//! - the event has the wire shape `{"type":"update","date":<key>}`
//! - a subscriber that disconnected before the save receives nothing
//!   and does not prevent delivery to the others
//! - inbound messages from a subscriber are ignored, not fatal

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

use dayplan_server::config::ServerConfig;
use dayplan_server::server::{self, AppState};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Starts the gateway with a fresh temporary data root.
async fn start_test_server() -> (std::net::SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        data_dir: dir.path().to_path_buf(),
        static_dir: dir.path().join("static"),
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::new(&config));
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start test server");
    (addr, dir)
}

/// Helper: connect a WebSocket subscriber to the test server.
async fn connect_subscriber(addr: std::net::SocketAddr) -> WsStream {
    let url = format!("ws://{addr}/ws");
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws
}

/// Helper: save a task list over HTTP.
async fn save_tasks(addr: std::net::SocketAddr, date: &str, tasks: &serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/tasks/{date}"))
        .json(tasks)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
}

/// Helper: receive the next update event, with a timeout so a missed
/// delivery fails the test instead of hanging it.
async fn recv_update(ws: &mut WsStream) -> serde_json::Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for update")
        .unwrap()
        .unwrap();
    match msg {
        tungstenite::Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn save_notifies_connected_subscriber() {
    let (addr, _dir) = start_test_server().await;
    let mut ws = connect_subscriber(addr).await;

    save_tasks(
        addr,
        "2026-08-23",
        &serde_json::json!([{ "time": "09:00", "name": "Run", "done": false }]),
    )
    .await;

    let event = recv_update(&mut ws).await;
    assert_eq!(event["type"], "update");
    assert_eq!(event["date"], "2026-08-23");
}

#[tokio::test]
async fn all_subscribers_receive_the_update() {
    let (addr, _dir) = start_test_server().await;
    let mut first = connect_subscriber(addr).await;
    let mut second = connect_subscriber(addr).await;

    save_tasks(
        addr,
        "2026-08-24",
        &serde_json::json!([{ "time": "08:00", "name": "Read", "done": false }]),
    )
    .await;

    assert_eq!(recv_update(&mut first).await["date"], "2026-08-24");
    assert_eq!(recv_update(&mut second).await["date"], "2026-08-24");
}

#[tokio::test]
async fn disconnected_subscriber_does_not_block_others() {
    let (addr, _dir) = start_test_server().await;
    let mut gone = connect_subscriber(addr).await;
    let mut live = connect_subscriber(addr).await;

    gone.close(None).await.unwrap();
    // Give the server a moment to process the close frame.
    tokio::time::sleep(Duration::from_millis(100)).await;

    save_tasks(
        addr,
        "2026-08-25",
        &serde_json::json!([{ "time": "10:00", "name": "Plan", "done": false }]),
    )
    .await;

    assert_eq!(recv_update(&mut live).await["date"], "2026-08-25");
}

#[tokio::test]
async fn late_subscriber_only_sees_later_saves() {
    let (addr, _dir) = start_test_server().await;

    save_tasks(
        addr,
        "2026-08-26",
        &serde_json::json!([{ "time": "09:00", "name": "Early", "done": false }]),
    )
    .await;

    let mut ws = connect_subscriber(addr).await;

    save_tasks(
        addr,
        "2026-08-27",
        &serde_json::json!([{ "time": "09:00", "name": "Late", "done": false }]),
    )
    .await;

    // The first (and only) event is for the save made after
    // subscribing.
    assert_eq!(recv_update(&mut ws).await["date"], "2026-08-27");
}

#[tokio::test]
async fn inbound_messages_are_ignored() {
    let (addr, _dir) = start_test_server().await;
    let mut ws = connect_subscriber(addr).await;

    // This layer has no inbound message types; anything the client
    // sends is dropped and the subscription stays alive.
    ws.send(tungstenite::Message::Text("hello?".into()))
        .await
        .unwrap();

    save_tasks(
        addr,
        "2026-08-28",
        &serde_json::json!([{ "time": "11:00", "name": "Write", "done": false }]),
    )
    .await;

    assert_eq!(recv_update(&mut ws).await["date"], "2026-08-28");
}
