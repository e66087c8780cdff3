//! HTTP/WebSocket gateway.
//!
//! A thin axum layer over the core: task routes map onto the
//! [`TaskStore`], the `/ws` endpoint registers subscribers with the
//! [`Broadcaster`], and every successful save publishes an
//! [`UpdateEvent`] for the changed key. The HTTP response is returned
//! independently of the broadcast outcome.

use std::sync::Arc;

use axum::Json;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use tower_http::services::{ServeDir, ServeFile};

use dayplan_core::broadcast::{Broadcaster, Subscription, UpdateEvent};
use dayplan_core::codec;
use dayplan_core::store::{StoreError, TaskStore};
use dayplan_core::task::Task;

use crate::config::ServerConfig;
use crate::weather::{self, HourlyWeather, WeatherError};

/// Shared gateway state: the two process-lifetime singletons plus the
/// resolved directories.
pub struct AppState {
    /// Keyed file store for task lists.
    pub store: TaskStore,
    /// Registry of live-update subscribers.
    pub broadcaster: Broadcaster,
    weather_dir: std::path::PathBuf,
    static_dir: std::path::PathBuf,
}

impl AppState {
    /// Builds the gateway state from the resolved config.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            store: TaskStore::new(&config.data_dir),
            broadcaster: Broadcaster::new(),
            weather_dir: config.data_dir.join("weather"),
            static_dir: config.static_dir.clone(),
        }
    }
}

/// Gateway-level request errors and their HTTP mapping.
#[derive(Debug, thiserror::Error)]
enum ApiError {
    /// The request body failed validation before reaching the store.
    #[error("{0}")]
    Validation(String),

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reading weather records failed.
    #[error(transparent)]
    Weather(#[from] WeatherError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) | Self::Store(StoreError::InvalidKey(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Store(_) | Self::Weather(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error = %message, "request failed");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Validates a request body before it reaches the store. The codec
/// assumes pre-validated fields, so this is the one place malformed
/// input is turned away with a 400.
fn validate_tasks(tasks: &[Task]) -> Result<(), ApiError> {
    for task in tasks {
        if !codec::is_valid_time(&task.time) {
            return Err(ApiError::Validation(format!(
                "invalid time format: {}",
                task.time
            )));
        }
        if task.name.is_empty() {
            return Err(ApiError::Validation("task name is required".to_string()));
        }
        if task.name.contains('\n') || task.name.contains('\r') {
            return Err(ApiError::Validation(
                "task name must not contain line breaks".to_string(),
            ));
        }
        if let Some(duration) = &task.duration
            && !codec::is_valid_duration(duration)
        {
            return Err(ApiError::Validation(format!(
                "invalid duration format: {duration}"
            )));
        }
    }
    Ok(())
}

async fn get_tasks(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.get(&date).await?))
}

async fn save_tasks(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
    Json(tasks): Json<Vec<Task>>,
) -> Result<StatusCode, ApiError> {
    validate_tasks(&tasks)?;
    state.store.save(&date, tasks).await?;

    // Notify live subscribers; delivery is best-effort and does not
    // affect the response.
    state.broadcaster.publish(&UpdateEvent::new(&date)).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_templates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_templates().await?))
}

async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.store.get(&format!("templates/{name}")).await?))
}

async fn get_weather(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<HourlyWeather>>, ApiError> {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(Json(weather::read_for_date(&state.weather_dir, &today).await?))
}

/// axum handler that upgrades an HTTP request to a WebSocket
/// connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles one live-update subscriber connection.
///
/// The connection lifecycle:
/// 1. Register with the broadcaster.
/// 2. A writer task forwards update events as JSON text frames.
/// 3. A reader task exists only to detect closure; inbound messages
///    from the client are ignored by this layer.
/// 4. When either side ends, the other is aborted and the subscriber
///    is unregistered.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Subscription { id, mut events } = state.broadcaster.subscribe().await;
    tracing::info!(subscriber = ?id, "live-update client connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!("WebSocket write failed");
                break;
            }
        }
    });

    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.broadcaster.unsubscribe(id).await;
    tracing::info!(subscriber = ?id, "live-update client disconnected");
}

/// Builds the gateway router: API routes, the WebSocket endpoint, and
/// the static web client as the fallback (`index.html` for unmatched
/// paths, SPA-style).
fn router(state: Arc<AppState>) -> axum::Router {
    let spa = ServeDir::new(&state.static_dir)
        .not_found_service(ServeFile::new(state.static_dir.join("index.html")));

    axum::Router::new()
        .route("/api/tasks/{date}", get(get_tasks).post(save_tasks))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/{name}", get(get_template))
        .route("/api/weather", get(get_weather))
        .route("/ws", get(ws_handler))
        .fallback_service(spa)
        .with_state(state)
}

/// Starts the server on the given address and returns the bound
/// address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given
/// address.
pub async fn start_server(
    addr: &str,
    config: &ServerConfig,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(AppState::new(config))).await
}

/// Starts the server with a pre-built [`AppState`].
///
/// This is the primary entry point used by both `main.rs` and test
/// code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given
/// address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}
