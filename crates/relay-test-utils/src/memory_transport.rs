//! In-memory transport for driving `Hub::serve` without a socket.
//!
//! [`MemoryTransport::pair`] returns the relay's side (an inbound stream and
//! an outbound sink, the shape `Hub::serve` takes) and a [`TestPeer`] that
//! plays the remote client.

use futures::stream::{self, BoxStream};
use futures::{sink, Sink};
use serde_json::Value;
use signal_relay::signaling::SignalEvent;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long [`TestPeer::next_event`] waits before giving up.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Inbound frames as `Hub::serve` reads them.
pub type InboundFrames = BoxStream<'static, Result<String, TransportError>>;

/// Outbound frames as `Hub::serve` writes them.
pub type OutboundFrames = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// The relay's half of an in-memory connection.
pub struct MemoryTransport {
    pub inbound: InboundFrames,
    pub outbound: OutboundFrames,
}

impl MemoryTransport {
    /// Create a connected (peer, relay-side) pair.
    #[must_use]
    pub fn pair() -> (TestPeer, MemoryTransport) {
        let (to_relay, from_peer) = mpsc::unbounded_channel::<Result<String, TransportError>>();
        let (to_peer, from_relay) = mpsc::unbounded_channel::<String>();

        let inbound = stream::unfold(from_peer, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        let outbound = sink::unfold(to_peer, |tx, frame: String| async move {
            tx.send(frame)
                .map_err(|_| TransportError("peer hung up".to_string()))?;
            Ok::<_, TransportError>(tx)
        });

        let peer = TestPeer {
            to_relay: Some(to_relay),
            from_relay,
        };
        let transport = MemoryTransport {
            inbound: Box::pin(inbound),
            outbound: Box::pin(outbound),
        };
        (peer, transport)
    }
}

/// The remote client's half of an in-memory connection.
pub struct TestPeer {
    to_relay: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
    from_relay: mpsc::UnboundedReceiver<String>,
}

impl TestPeer {
    /// Send a raw text frame.
    pub fn send_raw(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.to_relay {
            let _ = tx.send(Ok(frame.into()));
        }
    }

    /// Send a JSON frame.
    pub fn send_json(&self, frame: &Value) {
        self.send_raw(frame.to_string());
    }

    /// Inject a transport read error.
    pub fn fail(&self, reason: &str) {
        if let Some(tx) = &self.to_relay {
            let _ = tx.send(Err(TransportError(reason.to_string())));
        }
    }

    /// Close the peer's write side; the relay sees end-of-stream.
    pub fn hang_up(&mut self) {
        self.to_relay = None;
    }

    /// Next event from the relay, or `None` on timeout or closed transport.
    pub async fn next_event(&mut self) -> Option<SignalEvent> {
        self.next_event_within(DEFAULT_EVENT_TIMEOUT).await
    }

    pub async fn next_event_within(&mut self, limit: Duration) -> Option<SignalEvent> {
        let frame = tokio::time::timeout(limit, self.from_relay.recv())
            .await
            .ok()??;
        Some(serde_json::from_str(&frame).expect("relay sent a valid event"))
    }

    /// Every event already written by the relay.
    pub fn drain_events(&mut self) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.from_relay.try_recv() {
            events.push(serde_json::from_str(&frame).expect("relay sent a valid event"));
        }
        events
    }

    /// `true` once the relay has closed its side and every frame was read.
    pub async fn is_closed_by_relay(&mut self) -> bool {
        matches!(
            tokio::time::timeout(DEFAULT_EVENT_TIMEOUT, self.from_relay.recv()).await,
            Ok(None)
        )
    }
}
