//! Per-connection lifecycle handle.
//!
//! `Connecting -> Active -> Closing -> Closed`. Transitions are
//! compare-and-swap so concurrent teardown triggers agree on a single winner.
//! Each handle owns a child of the hub's shutdown token: cancelling the hub
//! cancels every connection, cancelling one connection stops only its pumps.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Lifecycle state of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Active = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Active,
            2 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Shared handle to a live connection.
///
/// Cloned into the room's `Client` entry and into the session that drives
/// the pumps; all clones observe the same state and token.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Arc<str>,
    state: Arc<AtomicU8>,
    cancel_token: CancellationToken,
    opened_at: Instant,
}

impl ConnectionHandle {
    /// New handle in `Connecting`, cancelled together with `parent`.
    #[must_use]
    pub fn new(connection_id: &str, parent: &CancellationToken) -> Self {
        Self {
            connection_id: Arc::from(connection_id),
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting as u8)),
            cancel_token: parent.child_token(),
            opened_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Connecting -> Active`. Returns `false` if the connection already
    /// started closing.
    pub fn activate(&self) -> bool {
        self.transition(ConnectionState::Connecting, ConnectionState::Active)
    }

    /// Move to `Closing`. Returns `true` only for the first caller; later
    /// triggers on a closing or closed connection are no-ops.
    pub fn begin_close(&self) -> bool {
        self.transition(ConnectionState::Active, ConnectionState::Closing)
            || self.transition(ConnectionState::Connecting, ConnectionState::Closing)
    }

    /// `Closing -> Closed`, and stop both pumps.
    pub fn finish_close(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        self.cancel_token.cancel();
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Completes when this connection (or the hub) is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel_token.cancelled()
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Time since the handle was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
