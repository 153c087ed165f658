//! Recording handlers.
//!
//! - `POST /recording/start` - Start a recording for a room
//! - `POST /recording/stop` - Stop an active recording
//! - `GET /recording/list/:room_id` - Recordings of one room
//!
//! A start or stop may name a `client_id`; that participant's recording
//! marker is set or cleared so peers can display it.

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::handlers::{parse_body, require_field};
use crate::recording::Recording;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct StartRecordingRequest {
    room_id: String,
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StopRecordingRequest {
    recording_id: String,
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub message: &'static str,
    pub recording: Recording,
}

#[derive(Debug, Serialize)]
pub struct ListRecordingsResponse {
    pub recordings: Vec<Recording>,
}

/// Handler for POST /recording/start
///
/// # Response
///
/// - 201 Created: Recording started
/// - 404 Not Found: Unknown room, or `client_id` not in the room
/// - 500 Internal Server Error: Placeholder file could not be created
#[instrument(skip_all, name = "relay.recording.start", fields(user_id = %identity.user_id))]
pub async fn start_recording(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<RecordingResponse>), RelayError> {
    let request: StartRecordingRequest = parse_body(&body)?;
    require_field(&request.room_id, "room_id")?;

    let room = state.registry.get(&request.room_id).await?;
    if let Some(client_id) = request.client_id.as_deref() {
        if !room.contains(client_id).await {
            return Err(RelayError::ClientNotFound(client_id.to_string()));
        }
    }

    let recording = state.recordings.start(room.id()).await?;

    if let Some(client_id) = request.client_id.as_deref() {
        // The client may have left since the check above.
        if let Err(e) = room
            .set_recording(client_id, Some(recording.id.clone()))
            .await
        {
            warn!(
                target: "relay.recording",
                room_id = %room.id(),
                client_id = %client_id,
                error = %e,
                "Recording marker not set"
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(RecordingResponse {
            message: "Recording started successfully",
            recording,
        }),
    ))
}

/// Handler for POST /recording/stop
///
/// # Response
///
/// - 200 OK: Recording completed
/// - 404 Not Found: Unknown recording
/// - 409 Conflict: Recording already stopped
#[instrument(skip_all, name = "relay.recording.stop", fields(user_id = %identity.user_id))]
pub async fn stop_recording(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<Json<RecordingResponse>, RelayError> {
    let request: StopRecordingRequest = parse_body(&body)?;
    require_field(&request.recording_id, "recording_id")?;

    let recording = state.recordings.stop(&request.recording_id).await?;

    if let Some(client_id) = request.client_id.as_deref() {
        let cleared = match state.registry.get(&recording.room_id).await {
            Ok(room) => room.set_recording(client_id, None).await,
            Err(e) => Err(e),
        };
        if let Err(e) = cleared {
            debug!(
                target: "relay.recording",
                recording_id = %recording.id,
                client_id = %client_id,
                error = %e,
                "Recording marker not cleared"
            );
        }
    }

    Ok(Json(RecordingResponse {
        message: "Recording stopped successfully",
        recording,
    }))
}

/// Handler for GET /recording/list/:room_id
pub async fn list_recordings(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Json<ListRecordingsResponse> {
    Json(ListRecordingsResponse {
        recordings: state.recordings.list(&room_id).await,
    })
}
