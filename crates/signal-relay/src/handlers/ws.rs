//! WebSocket signaling endpoint.
//!
//! `GET /ws?room_id=<id>` upgrades to a WebSocket and hands it to the hub.
//! The client is registered *before* the upgrade completes, so an unknown
//! room or a draining relay is answered with a plain HTTP error instead of
//! a socket that closes immediately.
//!
//! Frame mapping:
//! - inbound `Text` (and UTF-8 `Binary`) frames are signaling events
//! - `Close` ends the inbound stream
//! - `Ping`/`Pong` are left to the WebSocket layer
//! - outbound events are written as `Text`

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::hub::{ClientSession, Hub};
use crate::routes::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    Extension,
};
use futures::{future, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room_id: String,
}

/// Handler for GET /ws
///
/// # Response
///
/// - 101 Switching Protocols: Connected; a `welcome` event follows
/// - 401 Unauthorized: Missing or invalid token
/// - 404 Not Found: Unknown room
/// - 503 Service Unavailable: Relay is shutting down
#[instrument(
    skip_all,
    name = "relay.ws.upgrade",
    fields(room_id = %query.room_id, user_id = %identity.user_id)
)]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<SessionIdentity>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let hub = Arc::clone(&state.hub);
    let session = hub.connect(identity, &query.room_id).await?;

    let room_id = session.room().id().to_string();
    let client_id = session.client_id().to_string();
    let failed_hub = Arc::clone(&hub);

    Ok(ws
        .on_failed_upgrade(move |e| {
            warn!(
                target: "relay.ws",
                client_id = %client_id,
                error = %e,
                "WebSocket upgrade failed"
            );
            tokio::spawn(async move {
                if let Err(e) = failed_hub.leave(&room_id, &client_id).await {
                    debug!(target: "relay.ws", error = %e, "Client already removed");
                }
            });
        })
        .on_upgrade(move |socket| run_socket(hub, session, socket)))
}

async fn run_socket(hub: Arc<Hub>, session: ClientSession, socket: WebSocket) {
    let client_id = session.client_id().to_string();
    let (sink, stream) = socket.split();

    let inbound = stream
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => String::from_utf8(bytes).ok().map(Ok),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });
    let outbound =
        sink.with(|frame: String| future::ready(Ok::<_, axum::Error>(Message::Text(frame))));

    let reason = hub.serve(session, inbound, outbound).await;
    debug!(target: "relay.ws", client_id = %client_id, reason = %reason, "WebSocket closed");
}
