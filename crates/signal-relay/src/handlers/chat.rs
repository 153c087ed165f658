//! Chat handlers.
//!
//! - `POST /chat/send` - Append a message to a room's log
//! - `GET /chat/history/:room_id?limit=N` - Most recent messages, oldest first

use crate::auth::SessionIdentity;
use crate::chat::ChatMessage;
use crate::errors::RelayError;
use crate::handlers::{parse_body, require_field};
use crate::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct SendChatRequest {
    room_id: String,
    message: String,
}

#[derive(Debug, Serialize)]
pub struct SendChatResponse {
    pub message: &'static str,
    pub data: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

/// Handler for POST /chat/send
///
/// # Response
///
/// - 200 OK: Stored message
/// - 400 Bad Request: Empty message
/// - 404 Not Found: Unknown room
#[instrument(skip_all, name = "relay.chat.send", fields(user_id = %identity.user_id))]
pub async fn send_chat_message(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    body: axum::body::Bytes,
) -> Result<Json<SendChatResponse>, RelayError> {
    let request: SendChatRequest = parse_body(&body)?;
    require_field(&request.room_id, "room_id")?;

    let room = state.registry.get(&request.room_id).await?;
    let stored = state.chat.add(room.id(), &identity, &request.message).await?;

    Ok(Json(SendChatResponse {
        message: "Message sent successfully",
        data: stored,
    }))
}

/// Handler for GET /chat/history/:room_id
///
/// `limit` defaults to `RELAY_CHAT_RECENT_DEFAULT` and is capped at the
/// per-room log size. An unknown room has an empty history.
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let limit = query
        .limit
        .unwrap_or(state.config.chat_recent_default)
        .min(state.chat.limit());

    Json(HistoryResponse {
        messages: state.chat.recent(&room_id, limit).await,
    })
}
