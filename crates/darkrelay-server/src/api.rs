//! JSON HTTP API over the room store.
//!
//! Store calls run on the blocking pool because a configured journal writes
//! to SQLite inside them. Clients poll `GET /rooms/:id` for new messages.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use darkrelay_shared::{RoomId, SenderId};
use darkrelay_store::conversation::{post_message, read_transcript, Transcript};
use darkrelay_store::{RoomStore, RoomSummary, StoreError};

use crate::config::ServerConfig;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoomStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    // JSON framing and escaping can roughly double the plaintext size.
    let body_limit = state.config.max_message_size.saturating_mul(2).saturating_add(4096);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_transcript).delete(delete_room))
        .route("/rooms/:id/join", post(join_room))
        .route("/rooms/:id/messages", post(send_message).delete(clear_messages))
        .route("/rooms/:id/verify", get(verify_room))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run a store call on the blocking pool; journal writes may touch SQLite.
async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("Store task failed: {e}")))?
        .map_err(ServerError::from)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    rooms: usize,
    room_ttl_secs: Option<u64>,
}

#[derive(Deserialize)]
struct CreateRoomRequest {
    #[serde(default)]
    name: String,
}

#[derive(Serialize)]
struct CreateRoomResponse {
    room_id: RoomId,
}

#[derive(Deserialize, Default)]
struct JoinRequest {
    #[serde(default)]
    sender_id: Option<String>,
}

#[derive(Serialize)]
struct JoinResponse {
    room_id: RoomId,
    name: String,
    sender_id: SenderId,
    participant_count: usize,
    message_count: usize,
}

#[derive(Deserialize)]
struct SendMessageRequest {
    sender_id: String,
    content: String,
}

#[derive(Serialize)]
struct SendMessageResponse {
    hash: String,
    prev_hash: String,
    timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct VerifyResponse {
    valid: bool,
    first_bad_index: Option<usize>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Result<Json<ServerInfoResponse>, ServerError> {
    let store = state.store.clone();
    let rooms = blocking(move || store.len()).await?;
    Ok(Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        rooms,
        room_ttl_secs: state.config.room_ttl.map(|ttl| ttl.as_secs()),
    }))
}

async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), ServerError> {
    let store = state.store.clone();
    let room_id = blocking(move || store.create_room(&req.name)).await?;
    Ok((StatusCode::CREATED, Json(CreateRoomResponse { room_id })))
}

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomSummary>>, ServerError> {
    let store = state.store.clone();
    Ok(Json(blocking(move || store.list_rooms()).await?))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transcript>, ServerError> {
    let room_id = RoomId::parse(&id)?;
    let store = state.store.clone();
    let transcript = blocking(move || read_transcript(&store, &room_id)).await?;
    Ok(Json(transcript))
}

async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let room_id = RoomId::parse(&id)?;
    let store = state.store.clone();
    blocking(move || store.delete_room(&room_id)).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn join_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<JoinRequest>>,
) -> Result<Json<JoinResponse>, ServerError> {
    let room_id = RoomId::parse(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let sender = match req.sender_id.as_deref().map(str::trim) {
        None | Some("") => SenderId::generate(),
        Some(given) => client_sender(given)?,
    };

    let store = state.store.clone();
    let joined = sender.clone();
    let view = blocking(move || store.join_room(&room_id, &joined)).await?;

    Ok(Json(JoinResponse {
        room_id: view.id,
        name: view.name,
        sender_id: sender,
        participant_count: view.participants.len(),
        message_count: view.messages.len(),
    }))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ServerError> {
    let room_id = RoomId::parse(&id)?;
    let sender = client_sender(req.sender_id.trim())?;

    let store = state.store.clone();
    let message = blocking(move || post_message(&store, &room_id, &sender, &req.content)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            hash: message.hash,
            prev_hash: message.prev_hash,
            timestamp: message.timestamp,
        }),
    ))
}

async fn clear_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let room_id = RoomId::parse(&id)?;
    let store = state.store.clone();
    blocking(move || store.clear_messages(&room_id)).await?;
    Ok(Json(serde_json::json!({ "cleared": true })))
}

async fn verify_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<VerifyResponse>, ServerError> {
    let room_id = RoomId::parse(&id)?;
    let store = state.store.clone();
    let first_bad_index = blocking(move || match store.verify_room(&room_id) {
        Ok(()) => Ok(None),
        Err(StoreError::ChainVerificationFailed(brk)) => Ok(Some(brk.index)),
        Err(e) => Err(e),
    })
    .await?;

    Ok(Json(VerifyResponse {
        valid: first_bad_index.is_none(),
        first_bad_index,
    }))
}

/// Sender ids supplied by clients; the system id is reserved.
fn client_sender(raw: &str) -> Result<SenderId, ServerError> {
    if raw.is_empty() {
        return Err(ServerError::BadRequest("sender_id must not be empty".into()));
    }
    let sender = SenderId::from(raw);
    if sender.is_system() {
        return Err(ServerError::BadRequest("sender_id is reserved".into()));
    }
    Ok(sender)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
