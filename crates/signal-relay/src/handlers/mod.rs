//! HTTP request handlers for Signal Relay.

pub mod accounts;
pub mod chat;
pub mod metrics;
pub mod recording;
pub mod rooms;
pub mod ws;

pub use accounts::{login, register};
pub use chat::{chat_history, send_chat_message};
pub use metrics::metrics_handler;
pub use recording::{list_recordings, start_recording, stop_recording};
pub use rooms::{create_room, join_room, leave_room, list_rooms};
pub use ws::ws_handler;

use crate::errors::RelayError;
use serde::de::DeserializeOwned;

/// Deserialize a JSON body, answering 400 (not Axum's default 422) on failure.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "relay.handlers", error = %e, "Invalid request body");
        RelayError::BadRequest("Invalid request body".to_string())
    })
}

/// Reject a required string field that is present but blank.
pub(crate) fn require_field(value: &str, name: &str) -> Result<(), RelayError> {
    if value.trim().is_empty() {
        return Err(RelayError::BadRequest(format!("{name} is required")));
    }
    Ok(())
}
