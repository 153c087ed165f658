//! Idle-room reaper.
//!
//! Rooms are never deleted by their participants. Without a reaper, empty
//! rooms accumulate for the life of the process; with one, a room that has
//! had no participants for `ttl` is closed and dropped from the registry,
//! and its chat log and recording metadata are released.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A tick in
//! progress completes first.

use crate::routes::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Run the reaper loop until `cancel_token` fires.
#[instrument(skip_all, name = "relay.task.room_reaper", fields(ttl_seconds = ttl.as_secs()))]
pub async fn start_room_reaper(
    state: Arc<AppState>,
    ttl: Duration,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(target: "relay.task.room_reaper", "Room reaper started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.reap_idle_rooms(ttl).await;
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "relay.task.room_reaper",
                    "Room reaper received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::config::Config;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn state() -> (TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let vars = HashMap::from([
            (
                "RELAY_JWT_SECRET".to_string(),
                "reaper-test-secret-0123456789abcdef".to_string(),
            ),
            ("RELAY_BCRYPT_COST".to_string(), "4".to_string()),
            (
                "RELAY_RECORDINGS_DIR".to_string(),
                dir.path().display().to_string(),
            ),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        (dir, Arc::new(AppState::new(config)))
    }

    fn alice() -> SessionIdentity {
        SessionIdentity {
            user_id: "user-a".to_string(),
            username: "alice".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_removes_idle_room_and_stops_on_cancel() {
        let (_dir, state) = state();
        let room = state.registry.create("standup", "user-a").await;
        let cancel = CancellationToken::new();

        let task = tokio::spawn(start_room_reaper(
            Arc::clone(&state),
            Duration::from_secs(60),
            Duration::from_secs(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(75)).await;
        assert!(state.registry.get(room.id()).await.is_err());
        assert!(!room.is_active());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_keeps_recent_room() {
        let (_dir, state) = state();
        let room = state.registry.create("standup", "user-a").await;
        let cancel = CancellationToken::new();

        let task = tokio::spawn(start_room_reaper(
            Arc::clone(&state),
            Duration::from_secs(300),
            Duration::from_secs(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(state.registry.get(room.id()).await.is_ok());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recreated_room_does_not_inherit_history() {
        let (_dir, state) = state();
        state
            .registry
            .get_or_create("standup", "Standup", "user-a")
            .await;
        state
            .chat
            .add("standup", &alice(), "from the old room")
            .await
            .unwrap();
        let recording = state.recordings.start("standup").await.unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        let fresh = state.registry.create("fresh", "user-a").await;
        state.chat.add(fresh.id(), &alice(), "keep").await.unwrap();

        let reaped = state.reap_idle_rooms(Duration::from_secs(60)).await;
        assert_eq!(reaped, vec!["standup".to_string()]);
        assert_eq!(state.chat.recent(fresh.id(), 50).await.len(), 1);

        let (_, created) = state
            .registry
            .get_or_create("standup", "Standup", "user-b")
            .await;
        assert!(created);
        assert!(state.chat.recent("standup", 50).await.is_empty());
        assert!(state.recordings.list("standup").await.is_empty());
        assert!(recording.filename.exists(), "files are kept");
    }
}
