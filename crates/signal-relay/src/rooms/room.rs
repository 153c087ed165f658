//! A room and its participants.
//!
//! Each room owns one `RwLock` over its client map. `broadcast` and
//! snapshots take the read side; `add_client`, `remove_client` and
//! `set_recording` take the write side. Nothing awaits I/O while holding
//! the lock: broadcast only performs non-blocking enqueues.

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::hub::connection::ConnectionHandle;
use crate::observability::metrics;
use crate::rooms::channel::{ChannelError, SignalChannel};
use crate::signaling::{PeerInfo, SignalEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One participant in a room.
#[derive(Debug)]
pub struct Client {
    pub id: String,
    pub identity: SessionIdentity,
    pub joined_at: DateTime<Utc>,
    pub channel: Arc<SignalChannel>,
    pub connection: ConnectionHandle,
    /// Set by the recording store, never by the relay itself.
    pub recording_id: Option<String>,
}

impl Client {
    #[must_use]
    pub fn new(
        id: String,
        identity: SessionIdentity,
        channel: Arc<SignalChannel>,
        connection: ConnectionHandle,
    ) -> Self {
        Self {
            id,
            identity,
            joined_at: Utc::now(),
            channel,
            connection,
            recording_id: None,
        }
    }

    #[must_use]
    pub fn summary(&self) -> PeerInfo {
        PeerInfo {
            client_id: self.id.clone(),
            user_id: self.identity.user_id.clone(),
            username: self.identity.username.clone(),
            joined_at: self.joined_at,
            is_recording: self.recording_id.is_some(),
            recording_id: self.recording_id.clone(),
        }
    }
}

/// Per-recipient result of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Queued successfully.
    pub delivered: usize,
    /// Discarded because the recipient's queue was full.
    pub dropped: usize,
    /// Recipient channel already closed (departing client).
    pub closed: usize,
}

/// Room metadata plus participant count, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub participant_count: usize,
}

#[derive(Debug)]
struct Members {
    clients: HashMap<String, Client>,
    /// When the room last became empty; `None` while occupied.
    empty_since: Option<Instant>,
}

#[derive(Debug)]
pub struct Room {
    id: String,
    name: String,
    creator_id: String,
    created_at: DateTime<Utc>,
    /// Only flipped while holding the members write lock.
    active: AtomicBool,
    members: RwLock<Members>,
}

impl Room {
    #[must_use]
    pub fn new(id: String, name: String, creator_id: String) -> Self {
        Self {
            id,
            name,
            creator_id,
            created_at: Utc::now(),
            active: AtomicBool::new(true),
            members: RwLock::new(Members {
                clients: HashMap::new(),
                empty_since: Some(Instant::now()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Insert a client.
    ///
    /// # Errors
    ///
    /// - `RoomNotFound` if the room was closed (reaped or removed)
    /// - `Conflict` if the client id is already registered
    pub async fn add_client(&self, client: Client) -> Result<(), RelayError> {
        let mut members = self.members.write().await;
        self.check_admission(&members, &client.id)?;
        self.insert(&mut members, client);
        drop(members);

        metrics::participant_joined();
        Ok(())
    }

    /// Insert a client whose first queued event is `greeting`.
    ///
    /// `greeting` receives the participants already present. It is queued
    /// and the client inserted under one write lock, so no broadcast can
    /// reach the new client ahead of it.
    ///
    /// # Errors
    ///
    /// Same as [`Room::add_client`].
    pub async fn admit<F>(&self, client: Client, greeting: F) -> Result<(), RelayError>
    where
        F: FnOnce(Vec<PeerInfo>) -> SignalEvent,
    {
        let mut members = self.members.write().await;
        self.check_admission(&members, &client.id)?;

        let event = greeting(sorted_peers(&members));
        if let Err(e) = client.channel.try_send(event) {
            warn!(
                target: "relay.room",
                room_id = %self.id,
                client_id = %client.id,
                error = %e,
                "Greeting not queued"
            );
        }
        self.insert(&mut members, client);
        drop(members);

        metrics::participant_joined();
        Ok(())
    }

    fn check_admission(&self, members: &Members, client_id: &str) -> Result<(), RelayError> {
        if !self.is_active() {
            return Err(RelayError::RoomNotFound(self.id.clone()));
        }
        if members.clients.contains_key(client_id) {
            return Err(RelayError::Conflict(format!(
                "client {client_id} already registered"
            )));
        }
        Ok(())
    }

    fn insert(&self, members: &mut Members, client: Client) {
        debug!(
            target: "relay.room",
            room_id = %self.id,
            client_id = %client.id,
            user_id = %client.identity.user_id,
            "Client added"
        );
        members.clients.insert(client.id.clone(), client);
        members.empty_since = None;
    }

    /// Remove a client and hand it back so the caller can close it once.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if the client is not (or no longer) registered.
    pub async fn remove_client(&self, client_id: &str) -> Result<Client, RelayError> {
        let mut members = self.members.write().await;
        let client = members
            .clients
            .remove(client_id)
            .ok_or_else(|| RelayError::ClientNotFound(client_id.to_string()))?;
        if members.clients.is_empty() {
            members.empty_since = Some(Instant::now());
        }
        drop(members);

        metrics::participant_left();
        debug!(
            target: "relay.room",
            room_id = %self.id,
            client_id = %client_id,
            "Client removed"
        );
        Ok(client)
    }

    /// Point-in-time copy of the participant list.
    pub async fn snapshot_participants(&self) -> Vec<PeerInfo> {
        sorted_peers(&*self.members.read().await)
    }

    pub async fn participant_count(&self) -> usize {
        self.members.read().await.clients.len()
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.members.read().await.clients.contains_key(client_id)
    }

    pub async fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            creator_id: self.creator_id.clone(),
            created_at: self.created_at,
            is_active: self.is_active(),
            participant_count: self.participant_count().await,
        }
    }

    /// Queue `event` on every client except `exclude`.
    ///
    /// Never blocks on a slow recipient: a full queue counts as a drop and
    /// is logged, a closed queue is skipped.
    pub async fn broadcast(&self, event: &SignalEvent, exclude: Option<&str>) -> BroadcastOutcome {
        let members = self.members.read().await;
        let mut outcome = BroadcastOutcome::default();

        for client in members.clients.values() {
            if exclude == Some(client.id.as_str()) {
                continue;
            }
            match client.channel.try_send(event.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(ChannelError::Full) => {
                    outcome.dropped += 1;
                    warn!(
                        target: "relay.room",
                        room_id = %self.id,
                        client_id = %client.id,
                        signal_type = %event.kind(),
                        total_dropped = client.channel.dropped(),
                        "Signal channel full, event dropped"
                    );
                }
                Err(ChannelError::Closed) => outcome.closed += 1,
            }
        }

        outcome
    }

    /// Set or clear a client's recording marker.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if the client is not registered.
    pub async fn set_recording(
        &self,
        client_id: &str,
        recording_id: Option<String>,
    ) -> Result<(), RelayError> {
        let mut members = self.members.write().await;
        let client = members
            .clients
            .get_mut(client_id)
            .ok_or_else(|| RelayError::ClientNotFound(client_id.to_string()))?;
        client.recording_id = recording_id;
        Ok(())
    }

    /// Close the room if it has been empty for at least `ttl`.
    ///
    /// Returns `true` if this call closed it. Once closed, `add_client`
    /// fails, so no join can race with removal from the registry.
    pub async fn close_if_idle(&self, ttl: Duration) -> bool {
        let members = self.members.write().await;
        let idle = members.clients.is_empty()
            && members
                .empty_since
                .is_some_and(|since| since.elapsed() >= ttl);
        if idle {
            self.active.store(false, Ordering::Release);
        }
        idle
    }

    /// Close the room unconditionally. Returns `false` if already closed.
    pub async fn close(&self) -> bool {
        let _members = self.members.write().await;
        self.active.swap(false, Ordering::AcqRel)
    }
}

fn sorted_peers(members: &Members) -> Vec<PeerInfo> {
    let mut peers: Vec<PeerInfo> = members.clients.values().map(Client::summary).collect();
    peers.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
    peers
}
