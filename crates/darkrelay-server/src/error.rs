use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use darkrelay_shared::{IdError, RoomId};
use darkrelay_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Chain verification failed at message {first_bad_index}")]
    ChainCompromised { first_bad_index: usize },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServerError::RoomNotFound(id),
            StoreError::MessageTooLarge { size, max } => ServerError::MessageTooLarge { size, max },
            StoreError::EmptyMessage => ServerError::BadRequest(err.to_string()),
            StoreError::ChainMismatch { .. }
            | StoreError::InvalidMessageHash
            | StoreError::RetriesExhausted { .. } => ServerError::Conflict(err.to_string()),
            StoreError::ChainVerificationFailed(brk) => ServerError::ChainCompromised {
                first_bad_index: brk.index,
            },
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<IdError> for ServerError {
    fn from(err: IdError) -> Self {
        ServerError::BadRequest(format!("Invalid room id: {err}"))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::RoomNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::MessageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            ServerError::Conflict(_) | ServerError::ChainCompromised { .. } => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = match &self {
            ServerError::ChainCompromised { first_bad_index } => serde_json::json!({
                "error": message,
                "first_bad_index": first_bad_index,
            }),
            _ => serde_json::json!({
                "error": message,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}
