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

//! Integration tests for the task and template HTTP API.
//!
//! Starts the real gateway on an OS-assigned port with a temporary
//! data root and exercises the routes over HTTP:
//! - a never-created key is a normal empty-list response
//! - saves are persisted sorted ascending by time
//! - gateway validation rejects malformed bodies with 400
//! - store and decode failures map to a server-error response
//! - template listing and fetching share the task file mechanism

use std::sync::Arc;

use dayplan_server::config::ServerConfig;
use dayplan_server::server::{self, AppState};

/// Starts the gateway with a fresh temporary data root.
///
/// The `TempDir` must stay alive for the duration of the test.
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

fn url(addr: std::net::SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

#[tokio::test]
async fn fresh_date_returns_empty_list() {
    let (addr, _dir) = start_test_server().await;

    let response = reqwest::get(url(addr, "/api/tasks/2026-08-23"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let tasks: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn save_then_get_returns_records_sorted_by_time() {
    let (addr, _dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!([
        { "time": "12:00", "name": "Lunch", "done": false },
        { "time": "06:30", "name": "Wake", "done": true },
        { "time": "09:00", "name": "Run", "duration": "30min", "done": false },
    ]);
    let response = client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let tasks: Vec<serde_json::Value> = reqwest::get(url(addr, "/api/tasks/2026-08-23"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let times: Vec<&str> = tasks.iter().map(|t| t["time"].as_str().unwrap()).collect();
    assert_eq!(times, vec!["06:30", "09:00", "12:00"]);
    assert_eq!(tasks[1]["duration"], "30min");
}

#[tokio::test]
async fn resave_replaces_and_resorts() {
    // Save Run alone, then Stretch+Run; the final list has both with
    // Stretch first.
    let (addr, _dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let first = serde_json::json!([
        { "time": "09:00", "name": "Run", "done": false },
    ]);
    client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .json(&first)
        .send()
        .await
        .unwrap();

    let second = serde_json::json!([
        { "time": "07:30", "name": "Stretch", "done": true, "duration": "10min" },
        { "time": "09:00", "name": "Run", "done": false },
    ]);
    client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .json(&second)
        .send()
        .await
        .unwrap();

    let tasks: Vec<serde_json::Value> = reqwest::get(url(addr, "/api/tasks/2026-08-23"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["name"], "Stretch");
    assert_eq!(tasks[0]["done"], true);
    assert_eq!(tasks[1]["name"], "Run");
}

#[tokio::test]
async fn invalid_time_rejected_and_nothing_persisted() {
    let (addr, _dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!([
        { "time": "25:99", "name": "Impossible", "done": false },
    ]);
    let response = client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let tasks: Vec<serde_json::Value> = reqwest::get(url(addr, "/api/tasks/2026-08-23"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn unitless_duration_rejected() {
    let (addr, _dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!([
        { "time": "09:00", "name": "Run", "duration": "30", "done": false },
    ]);
    let response = client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn non_json_body_is_a_client_error() {
    let (addr, _dir) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(url(addr, "/api/tasks/2026-08-23"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn corrupt_task_file_maps_to_server_error() {
    let (addr, dir) = start_test_server().await;

    std::fs::write(
        dir.path().join("2026-08-23.md"),
        "- [ ] 09:00 Run (nonsense)\n",
    )
    .unwrap();

    let response = reqwest::get(url(addr, "/api/tasks/2026-08-23"))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("duration"));
}

#[tokio::test]
async fn templates_listed_and_fetched() {
    let (addr, dir) = start_test_server().await;

    let templates = dir.path().join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(
        templates.join("morning.md"),
        "# Morning routine\n- [ ] 06:30 Wake\n- [ ] 07:00 Stretch (10min)\n",
    )
    .unwrap();

    let names: Vec<String> = reqwest::get(url(addr, "/api/templates"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names, vec!["morning".to_string()]);

    let tasks: Vec<serde_json::Value> = reqwest::get(url(addr, "/api/templates/morning"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["name"], "Wake");
}

#[tokio::test]
async fn missing_template_is_empty_list() {
    let (addr, _dir) = start_test_server().await;

    let response = reqwest::get(url(addr, "/api/templates/never-made"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let tasks: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn no_templates_dir_lists_empty() {
    let (addr, _dir) = start_test_server().await;

    let names: Vec<String> = reqwest::get(url(addr, "/api/templates"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(names.is_empty());
}

#[tokio::test]
async fn weather_empty_before_any_poll() {
    let (addr, _dir) = start_test_server().await;

    let response = reqwest::get(url(addr, "/api/weather")).await.unwrap();
    assert_eq!(response.status(), 200);

    let hours: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(hours.is_empty());
}
