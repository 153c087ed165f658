//! Bounded per-client outbound queue.
//!
//! Enqueueing never blocks: a full queue drops the newest event and counts
//! the drop. The receiving half is owned by the client's outbound pump,
//! which is the only writer to the transport.

use crate::signaling::SignalEvent;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why an event could not be queued.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("signal channel is closed")]
    Closed,

    #[error("signal channel is full")]
    Full,
}

/// Sending half of a client's signal queue.
#[derive(Debug)]
pub struct SignalChannel {
    sender: mpsc::Sender<SignalEvent>,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Receiving half, drained by the outbound pump.
#[derive(Debug)]
pub struct SignalReceiver {
    receiver: mpsc::Receiver<SignalEvent>,
}

impl SignalChannel {
    /// Create a channel holding at most `capacity` pending events.
    ///
    /// A capacity of 0 is raised to 1; configuration rejects 0 upfront.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Arc<SignalChannel>, SignalReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Arc::new(SignalChannel {
                sender,
                closed: AtomicBool::new(false),
                dropped: AtomicU64::new(0),
            }),
            SignalReceiver { receiver },
        )
    }

    /// Queue `event` without waiting.
    ///
    /// # Errors
    ///
    /// - `ChannelError::Closed` after [`SignalChannel::close`] or once the
    ///   receiver is gone
    /// - `ChannelError::Full` when `capacity` events are pending; the event is
    ///   discarded and the drop counter incremented
    pub fn try_send(&self, event: SignalEvent) -> Result<(), ChannelError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChannelError::Closed);
        }

        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Err(ChannelError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ChannelError::Closed),
        }
    }

    /// Close the channel. Returns `true` only for the first call.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.sender.is_closed()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Events queued and not yet taken by the pump.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Events discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SignalReceiver {
    /// Wait for the next event. `None` once every sender is gone and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<SignalEvent> {
        self.receiver.try_recv().ok()
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<SignalEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::signaling::{IceCandidate, SignalPayload};
    use serde_json::json;

    fn candidate(n: usize) -> SignalEvent {
        SignalEvent::from_sender(
            SignalPayload::IceCandidate(IceCandidate(json!({ "n": n }))),
            "sender",
        )
    }

    fn sequence(events: Vec<SignalEvent>) -> Vec<u64> {
        events
            .into_iter()
            .map(|e| match e.payload {
                SignalPayload::IceCandidate(IceCandidate(v)) => v["n"].as_u64().unwrap(),
                _ => u64::MAX,
            })
            .collect()
    }

    #[test]
    fn test_fifo_order() {
        let (channel, mut receiver) = SignalChannel::bounded(8);
        for n in 0..5 {
            channel.try_send(candidate(n)).unwrap();
        }

        assert_eq!(sequence(receiver.drain()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_full_channel_drops_newest_and_counts() {
        let (channel, mut receiver) = SignalChannel::bounded(3);
        for n in 0..3 {
            channel.try_send(candidate(n)).unwrap();
        }
        assert_eq!(channel.pending(), 3);

        assert_eq!(channel.try_send(candidate(3)), Err(ChannelError::Full));
        assert_eq!(channel.try_send(candidate(4)), Err(ChannelError::Full));
        assert_eq!(channel.dropped(), 2);
        assert_eq!(channel.pending(), 3, "never exceeds capacity");

        assert_eq!(sequence(receiver.drain()), vec![0, 1, 2]);
    }

    #[test]
    fn test_close_returns_true_exactly_once() {
        let (channel, _receiver) = SignalChannel::bounded(4);

        assert!(channel.close());
        assert!(!channel.close());
        assert!(!channel.close());
        assert!(channel.is_closed());
    }

    #[test]
    fn test_send_after_close_is_rejected() {
        let (channel, mut receiver) = SignalChannel::bounded(4);
        channel.close();

        assert_eq!(channel.try_send(candidate(0)), Err(ChannelError::Closed));
        assert!(receiver.try_recv().is_none());
        assert_eq!(channel.dropped(), 0, "closed sends are not drops");
    }

    #[test]
    fn test_send_after_receiver_dropped_is_closed() {
        let (channel, receiver) = SignalChannel::bounded(4);
        drop(receiver);

        assert!(channel.is_closed());
        assert_eq!(channel.try_send(candidate(0)), Err(ChannelError::Closed));
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let (channel, _receiver) = SignalChannel::bounded(0);
        assert_eq!(channel.capacity(), 1);
        channel.try_send(candidate(0)).unwrap();
        assert_eq!(channel.try_send(candidate(1)), Err(ChannelError::Full));
    }

    #[tokio::test]
    async fn test_recv_waits_for_event() {
        let (channel, mut receiver) = SignalChannel::bounded(4);

        let pump = tokio::spawn(async move { receiver.recv().await });
        tokio::task::yield_now().await;
        channel.try_send(candidate(7)).unwrap();

        let event = pump.await.unwrap().unwrap();
        assert_eq!(event.sender_id.as_deref(), Some("sender"));
    }
}
