//! Process-wide room directory.
//!
//! The registry map has its own `RwLock`, separate from every room's member
//! lock. The two are never held together: `list` and `reap_idle` collect
//! `Arc<Room>` handles, release the registry lock, then visit each room.

use crate::errors::RelayError;
use crate::observability::metrics;
use crate::rooms::room::{Room, RoomSummary};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty room under a fresh identifier.
    #[instrument(skip_all, fields(creator_id = %creator_id))]
    pub async fn create(&self, name: &str, creator_id: &str) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        let room = loop {
            let room_id = format!("room_{}", Uuid::new_v4().simple());
            if let Entry::Vacant(slot) = rooms.entry(room_id.clone()) {
                let room = Arc::new(Room::new(
                    room_id,
                    name.to_string(),
                    creator_id.to_string(),
                ));
                slot.insert(Arc::clone(&room));
                break room;
            }
        };
        let active = rooms.len();
        drop(rooms);

        metrics::record_room_created();
        metrics::set_rooms_active(active);
        info!(target: "relay.registry", room_id = %room.id(), name = %room.name(), "Room created");
        room
    }

    /// Look up `room_id`, creating it if absent.
    ///
    /// Concurrent callers for the same id all get the same `Arc<Room>`.
    /// Returns the room and whether this call created it.
    pub async fn get_or_create(
        &self,
        room_id: &str,
        name: &str,
        creator_id: &str,
    ) -> (Arc<Room>, bool) {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return (Arc::clone(room), false);
        }

        let mut rooms = self.rooms.write().await;
        match rooms.entry(room_id.to_string()) {
            Entry::Occupied(existing) => (Arc::clone(existing.get()), false),
            Entry::Vacant(slot) => {
                let room = Arc::new(Room::new(
                    room_id.to_string(),
                    name.to_string(),
                    creator_id.to_string(),
                ));
                slot.insert(Arc::clone(&room));
                let active = rooms.len();
                drop(rooms);

                metrics::record_room_created();
                metrics::set_rooms_active(active);
                info!(target: "relay.registry", room_id = %room_id, "Room created");
                (room, true)
            }
        }
    }

    /// # Errors
    ///
    /// Returns `RoomNotFound` for an unknown id.
    pub async fn get(&self, room_id: &str) -> Result<Arc<Room>, RelayError> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RelayError::RoomNotFound(room_id.to_string()))
    }

    /// Summaries of every room, oldest first.
    pub async fn list(&self) -> Vec<RoomSummary> {
        let rooms: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(room.summary().await);
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Close and remove a room. Connected clients keep their `Arc<Room>`
    /// until they disconnect; no new client can join.
    ///
    /// # Errors
    ///
    /// Returns `RoomNotFound` for an unknown id.
    pub async fn remove(&self, room_id: &str) -> Result<Arc<Room>, RelayError> {
        let room = self.get(room_id).await?;
        room.close().await;

        let mut rooms = self.rooms.write().await;
        let evicted = evict(&mut rooms, &room);
        let active = rooms.len();
        drop(rooms);

        if evicted {
            metrics::set_rooms_active(active);
            info!(target: "relay.registry", room_id = %room_id, "Room removed");
        } else {
            debug!(target: "relay.registry", room_id = %room_id, "Room already replaced");
        }
        Ok(room)
    }

    /// Remove rooms that have had no participants for at least `ttl`.
    ///
    /// Returns the removed room ids.
    #[instrument(skip_all)]
    pub async fn reap_idle(&self, ttl: Duration) -> Vec<String> {
        let candidates: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut closed = Vec::new();
        for room in candidates {
            if room.close_if_idle(ttl).await {
                closed.push(room);
            }
        }

        if closed.is_empty() {
            debug!(target: "relay.registry", "No idle rooms to reap");
            return Vec::new();
        }

        let mut rooms = self.rooms.write().await;
        let reaped: Vec<String> = closed
            .iter()
            .filter(|room| evict(&mut rooms, room))
            .map(|room| room.id().to_string())
            .collect();
        let active = rooms.len();
        drop(rooms);

        metrics::record_rooms_reaped(reaped.len() as u64);
        metrics::set_rooms_active(active);
        info!(
            target: "relay.registry",
            reaped = reaped.len(),
            remaining = active,
            "Idle rooms reaped"
        );
        reaped
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

/// Remove `room` from the map only if its id still maps to this very
/// room; a replacement created under the same id stays.
fn evict(rooms: &mut HashMap<String, Arc<Room>>, room: &Arc<Room>) -> bool {
    match rooms.entry(room.id().to_string()) {
        Entry::Occupied(slot) if Arc::ptr_eq(slot.get(), room) => {
            slot.remove();
            true
        }
        _ => false,
    }
}
