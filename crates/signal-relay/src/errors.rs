//! Signal Relay error types.
//!
//! Participant-facing failures are returned as `RelayError` values from the
//! registry, room, hub and collaborator stores. The HTTP boundary turns them
//! into `{ "error": { "code", "message" } }` bodies via `IntoResponse`.
//! Internal details are logged server-side but not exposed to clients.
//!
//! Backpressure (a full signal channel) is deliberately absent here: it is
//! reported through `BroadcastOutcome` and metrics, never as an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Signal Relay error type.
///
/// Maps to HTTP status codes:
/// - `RoomNotFound`, `ClientNotFound`, `RecordingNotFound`: 404
/// - `Unauthorized`: 401
/// - `Conflict`: 409
/// - `BadRequest`: 400
/// - `Unavailable`: 503
/// - `Storage`, `Internal`: 500
#[derive(Debug, Error)]
pub enum RelayError {
    /// Room identifier is unknown (or the room has been reaped).
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Client identifier is not registered in the room.
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    /// Recording identifier is unknown.
    #[error("Recording not found: {0}")]
    RecordingNotFound(String),

    /// Missing or invalid identity token, or bad credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource state conflict (duplicate user, recording already stopped).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Relay is draining and refuses new connections.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Local filesystem failure in a collaborator store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::RoomNotFound(_)
            | RelayError::ClientNotFound(_)
            | RelayError::RecordingNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RelayError::Conflict(_) => StatusCode::CONFLICT,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Storage(_) | RelayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a stable machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            RelayError::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            RelayError::RecordingNotFound(_) => "RECORDING_NOT_FOUND",
            RelayError::Unauthorized(_) => "UNAUTHORIZED",
            RelayError::Conflict(_) => "CONFLICT",
            RelayError::BadRequest(_) => "BAD_REQUEST",
            RelayError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            RelayError::Storage(_) => "STORAGE_ERROR",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            RelayError::RoomNotFound(_) => "Room not found".to_string(),
            RelayError::ClientNotFound(_) => "Client not found".to_string(),
            RelayError::RecordingNotFound(_) => "Recording not found".to_string(),
            RelayError::Unauthorized(reason)
            | RelayError::Conflict(reason)
            | RelayError::BadRequest(reason)
            | RelayError::Unavailable(reason) => reason.clone(),
            RelayError::Storage(_) | RelayError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::Storage(err) => {
                tracing::error!(target: "relay.storage", error = %err, "Storage operation failed");
            }
            RelayError::Internal(err) => {
                tracing::error!(target: "relay.internal", error = %err, "Internal error");
            }
            _ => {}
        }

        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.client_message(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"signal-relay\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
