//! Signal fan-out policy.
//!
//! An inbound negotiation event from client C in room R is stamped with
//! C's id and the current time, then queued on every other client in R.
//! The payload is forwarded untouched.

use crate::observability::metrics;
use crate::rooms::{BroadcastOutcome, Room};
use crate::signaling::{SignalEvent, SignalPayload};
use tokio::time::Instant;
use tracing::trace;

/// Stateless router between a sender and its room.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalRouter;

impl SignalRouter {
    /// Fan `payload` out to the sender's peers.
    ///
    /// Delivery is best-effort: drops on full queues are counted in the
    /// returned outcome and in metrics, never surfaced as errors.
    pub async fn route(room: &Room, sender_id: &str, payload: SignalPayload) -> BroadcastOutcome {
        let kind = payload.kind();
        let event = SignalEvent::from_sender(payload, sender_id);

        let started = Instant::now();
        let outcome = room.broadcast(&event, Some(sender_id)).await;
        metrics::record_fanout_duration(started.elapsed());

        metrics::record_signal_relayed(kind.as_str());
        if outcome.dropped > 0 {
            metrics::record_deliveries_dropped(kind.as_str(), outcome.dropped as u64);
        }

        trace!(
            target: "relay.router",
            room_id = %room.id(),
            sender_id = %sender_id,
            signal_type = %kind,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Signal routed"
        );
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::SessionIdentity;
    use crate::hub::connection::ConnectionHandle;
    use crate::rooms::{Client, SignalChannel, SignalReceiver};
    use crate::signaling::{IceCandidate, SessionDescription, SignalKind};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    async fn join(room: &Room, id: &str, capacity: usize) -> SignalReceiver {
        let (channel, receiver) = SignalChannel::bounded(capacity);
        let identity = SessionIdentity {
            user_id: format!("user-{id}"),
            username: id.to_string(),
        };
        let connection = ConnectionHandle::new(id, &CancellationToken::new());
        room.add_client(Client::new(id.to_string(), identity, channel, connection))
            .await
            .unwrap();
        receiver
    }

    #[tokio::test]
    async fn test_route_stamps_sender_and_preserves_payload() {
        let room = Room::new("room_1".into(), "standup".into(), "user-a".into());
        let mut rx_a = join(&room, "a", 8).await;
        let mut rx_b = join(&room, "b", 8).await;

        let sdp = json!({"type": "offer", "sdp": "v=0\r\ns=-\r\n"});
        let outcome = SignalRouter::route(
            &room,
            "a",
            SignalPayload::Offer(SessionDescription(sdp.clone())),
        )
        .await;

        assert_eq!(outcome.delivered, 1);
        assert!(rx_a.try_recv().is_none(), "sender never receives its own event");

        let event = rx_b.try_recv().unwrap();
        assert_eq!(event.sender_id.as_deref(), Some("a"));
        assert_eq!(event.payload, SignalPayload::Offer(SessionDescription(sdp)));
        assert!(rx_b.try_recv().is_none(), "exactly one event");
    }

    #[tokio::test]
    async fn test_route_preserves_per_sender_order() {
        let room = Room::new("room_1".into(), "r".into(), "u".into());
        let _rx_a = join(&room, "a", 16).await;
        let mut rx_b = join(&room, "b", 16).await;

        for n in 0..10 {
            SignalRouter::route(
                &room,
                "a",
                SignalPayload::IceCandidate(IceCandidate(json!({ "n": n }))),
            )
            .await;
        }

        let order: Vec<u64> = rx_b
            .drain()
            .into_iter()
            .filter(|e| e.kind() == SignalKind::IceCandidate)
            .map(|e| match e.payload {
                SignalPayload::IceCandidate(IceCandidate(v)) => v["n"].as_u64().unwrap(),
                _ => u64::MAX,
            })
            .collect();
        assert_eq!(order, (0..10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_route_to_empty_room_is_harmless() {
        let room = Room::new("room_1".into(), "r".into(), "u".into());
        let _rx_a = join(&room, "a", 4).await;

        let outcome = SignalRouter::route(
            &room,
            "a",
            SignalPayload::Answer(SessionDescription(json!("v=0"))),
        )
        .await;
        assert_eq!(outcome, BroadcastOutcome::default());
    }
}
