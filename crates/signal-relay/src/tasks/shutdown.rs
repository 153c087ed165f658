//! Shutdown drain.
//!
//! After the shutdown token fires, live connections and the HTTP server get
//! one shared grace period. Both waits run against the same deadline, so the
//! whole drain never takes longer than `grace`.

use crate::hub::Hub;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, warn};

/// What finished before the grace deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    pub connections_drained: bool,
    pub server_stopped: bool,
}

/// Wait for the hub to drain and the server task to exit, within `grace`.
pub async fn drain_within(
    hub: &Hub,
    server: JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> DrainOutcome {
    let deadline = Instant::now() + grace;

    let connections_drained = hub.wait_for_drain(deadline).await;
    if !connections_drained {
        warn!(
            target: "relay.shutdown",
            remaining = hub.active_connections(),
            "Connections did not drain within grace period"
        );
    }

    let server_stopped = match tokio::time::timeout_at(deadline, server).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(e))) => {
            error!(target: "relay.shutdown", error = %e, "HTTP server error");
            true
        }
        Ok(Err(e)) => {
            error!(target: "relay.shutdown", error = %e, "HTTP server task failed");
            true
        }
        Err(_) => {
            warn!(target: "relay.shutdown", "HTTP server did not stop within grace period");
            false
        }
    };

    DrainOutcome {
        connections_drained,
        server_stopped,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::hub::ClientSession;
    use crate::rooms::RoomRegistry;
    use std::sync::Arc;

    async fn hub_with_member() -> (Arc<Hub>, ClientSession) {
        let registry = Arc::new(RoomRegistry::new());
        let room_id = registry.create("r", "u").await.id().to_string();
        let hub = Arc::new(Hub::new(registry, 16, None));
        let identity = SessionIdentity {
            user_id: "u-a".to_string(),
            username: "a".to_string(),
        };
        let conn = hub.connect(identity, &room_id).await.unwrap();
        (hub, conn)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_connection_and_server_share_one_grace_period() {
        let (hub, _conn) = hub_with_member().await;
        let server = tokio::spawn(std::future::pending::<std::io::Result<()>>());

        let started = Instant::now();
        let outcome = drain_within(&hub, server, Duration::from_secs(10)).await;

        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(
            outcome,
            DrainOutcome {
                connections_drained: false,
                server_stopped: false,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_gets_what_is_left_of_the_grace_period() {
        let (hub, conn) = hub_with_member().await;
        let server = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(8)).await;
            Ok(())
        });
        let leaving = Arc::clone(&hub);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(6)).await;
            let room_id = conn.room().id().to_string();
            leaving.leave(&room_id, conn.client_id()).await.unwrap();
        });

        let started = Instant::now();
        let outcome = drain_within(&hub, server, Duration::from_secs(10)).await;

        assert_eq!(started.elapsed(), Duration::from_secs(8));
        assert!(outcome.connections_drained);
        assert!(outcome.server_stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_hub_and_stopped_server_return_at_once() {
        let registry = Arc::new(RoomRegistry::new());
        let hub = Hub::new(registry, 16, None);
        let server = tokio::spawn(async { Ok(()) });

        let started = Instant::now();
        let outcome = drain_within(&hub, server, Duration::from_secs(10)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(outcome.connections_drained && outcome.server_stopped);
    }
}
