//! Per-room chat log.
//!
//! Each room keeps at most `limit` messages; inserting past the limit
//! evicts the oldest. Logs are independent of the room registry and are
//! keyed by room id only.

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ChatStore {
    limit: usize,
    rooms: RwLock<HashMap<String, VecDeque<ChatMessage>>>,
}

impl ChatStore {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            rooms: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a message from `author` to `room_id`'s log.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for an empty message.
    pub async fn add(
        &self,
        room_id: &str,
        author: &SessionIdentity,
        message: &str,
    ) -> Result<ChatMessage, RelayError> {
        if message.trim().is_empty() {
            return Err(RelayError::BadRequest("Message must not be empty".to_string()));
        }

        let entry = ChatMessage {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            user_id: author.user_id.clone(),
            username: author.username.clone(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(room_id.to_string()).or_default();
        log.push_back(entry.clone());
        while log.len() > self.limit {
            log.pop_front();
        }
        drop(rooms);

        metrics::record_chat_message();
        debug!(
            target: "relay.chat",
            room_id = %room_id,
            user_id = %author.user_id,
            "Chat message stored"
        );
        Ok(entry)
    }

    /// The last `count` messages in arrival order.
    pub async fn recent(&self, room_id: &str, count: usize) -> Vec<ChatMessage> {
        let rooms = self.rooms.read().await;
        let Some(log) = rooms.get(room_id) else {
            return Vec::new();
        };
        let skip = log.len().saturating_sub(count);
        log.iter().skip(skip).cloned().collect()
    }

    pub async fn all(&self, room_id: &str) -> Vec<ChatMessage> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop a room's log. Returns how many messages were removed.
    pub async fn clear(&self, room_id: &str) -> usize {
        self.rooms
            .write()
            .await
            .remove(room_id)
            .map_or(0, |log| log.len())
    }
}
