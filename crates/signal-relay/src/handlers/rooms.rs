//! Room administration handlers.
//!
//! - `POST /create-room` - Create a room (optionally under a caller-chosen id)
//! - `POST /join-room` - Room snapshot plus the WebSocket path to connect on
//! - `POST /leave-room` - Administrative leave for one client
//! - `GET /rooms` - List rooms with participant counts
//!
//! Joining is completed by opening the WebSocket: `join-room` only resolves
//! the room and tells the caller where to connect.

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::handlers::{parse_body, require_field};
use crate::rooms::{is_valid_room_id, RoomSummary};
use crate::routes::AppState;
use crate::signaling::PeerInfo;
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    name: String,
    #[serde(default)]
    room_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub message: &'static str,
    pub room_id: String,
    pub name: String,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
struct JoinRoomRequest {
    room_id: String,
}

#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub room: RoomSummary,
    pub participants: Vec<PeerInfo>,
    pub ws_path: String,
}

#[derive(Debug, Deserialize)]
struct LeaveRoomRequest {
    room_id: String,
    client_id: String,
}

#[derive(Debug, Serialize)]
pub struct LeaveRoomResponse {
    pub message: &'static str,
    pub client_id: String,
}

#[derive(Debug, Serialize)]
pub struct ListRoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

/// Handler for POST /create-room
///
/// With `room_id` set, an existing room of that id is returned instead of a
/// new one (`created: false`, 200). Without it a fresh id is generated (201).
#[instrument(skip_all, name = "relay.rooms.create", fields(user_id = %identity.user_id))]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<CreateRoomResponse>), RelayError> {
    let request: CreateRoomRequest = parse_body(&body)?;
    require_field(&request.name, "name")?;

    let (room, created) = match request.room_id.as_deref() {
        Some(room_id) => {
            if !is_valid_room_id(room_id) {
                return Err(RelayError::BadRequest("Invalid room_id".to_string()));
            }
            state
                .registry
                .get_or_create(room_id, &request.name, &identity.user_id)
                .await
        }
        None => (
            state
                .registry
                .create(&request.name, &identity.user_id)
                .await,
            true,
        ),
    };

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CreateRoomResponse {
            message: if created {
                "Room created successfully"
            } else {
                "Room already exists"
            },
            room_id: room.id().to_string(),
            name: room.name().to_string(),
            created,
        }),
    ))
}

/// Handler for POST /join-room
///
/// # Response
///
/// - 200 OK: Room snapshot and `ws_path`
/// - 404 Not Found: Unknown room
#[instrument(skip_all, name = "relay.rooms.join", fields(user_id = %identity.user_id))]
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<Json<JoinRoomResponse>, RelayError> {
    let request: JoinRoomRequest = parse_body(&body)?;
    require_field(&request.room_id, "room_id")?;

    let room = state.registry.get(&request.room_id).await?;
    if !room.is_active() {
        return Err(RelayError::RoomNotFound(request.room_id));
    }

    Ok(Json(JoinRoomResponse {
        participants: room.snapshot_participants().await,
        ws_path: format!("/ws?room_id={}", room.id()),
        room: room.summary().await,
    }))
}

/// Handler for POST /leave-room
///
/// # Response
///
/// - 200 OK: Client torn down, peers notified
/// - 404 Not Found: Unknown room or client (including a second leave)
#[instrument(skip_all, name = "relay.rooms.leave", fields(user_id = %identity.user_id))]
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<Json<LeaveRoomResponse>, RelayError> {
    let request: LeaveRoomRequest = parse_body(&body)?;
    require_field(&request.room_id, "room_id")?;
    require_field(&request.client_id, "client_id")?;

    let peer = state.hub.leave(&request.room_id, &request.client_id).await?;

    info!(
        target: "relay.rooms",
        room_id = %request.room_id,
        client_id = %peer.client_id,
        "Client left via administrative request"
    );
    Ok(Json(LeaveRoomResponse {
        message: "Left room successfully",
        client_id: peer.client_id,
    }))
}

/// Handler for GET /rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<ListRoomsResponse> {
    Json(ListRoomsResponse {
        rooms: state.registry.list().await,
    })
}
