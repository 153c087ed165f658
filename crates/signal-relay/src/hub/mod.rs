//! Connection hub.
//!
//! The hub turns an authenticated transport into a room participant and
//! runs its two pumps:
//!
//! - **inbound**: reads text frames, parses them, and hands negotiation
//!   events to [`SignalRouter`] (runs in the connection's own task)
//! - **outbound**: drains the client's [`SignalChannel`] onto the transport
//!   (a spawned task, and the only writer to that transport)
//!
//! Teardown removes the client from its room first; whoever wins that
//! removal closes the channel, cancels the pumps and notifies peers. Every
//! later trigger sees `ClientNotFound` and does nothing.
//!
//! Transports are generic: any `Stream<Item = Result<String, E>>` paired
//! with a `Sink<String>`. The WebSocket handler adapts axum's socket to
//! that shape.

pub mod connection;
pub mod router;

pub use connection::{ConnectionHandle, ConnectionState};
pub use router::SignalRouter;

use crate::auth::SessionIdentity;
use crate::errors::RelayError;
use crate::observability::metrics;
use crate::rooms::{
    BroadcastOutcome, Client, Room, RoomRegistry, SignalChannel, SignalReceiver,
};
use crate::signaling::{
    LeaveReason, PeerInfo, PeerLeft, SignalEvent, SignalKind, SignalPayload, Welcome,
    INVALID_SIGNAL_CODE,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A participant that has joined a room but whose pumps are not running yet.
#[derive(Debug)]
pub struct ClientSession {
    room: Arc<Room>,
    client_id: String,
    identity: SessionIdentity,
    channel: Arc<SignalChannel>,
    receiver: SignalReceiver,
    connection: ConnectionHandle,
}

impl ClientSession {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<SignalChannel> {
        &self.channel
    }

    /// The client's own queue, for reading events without a transport.
    pub fn receiver_mut(&mut self) -> &mut SignalReceiver {
        &mut self.receiver
    }
}

/// Why the outbound pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    Cancelled,
    ChannelClosed,
    WriteFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameFlow {
    Continue,
    Leave,
}

/// Connection lifecycle owner for every live participant.
#[derive(Debug)]
pub struct Hub {
    registry: Arc<RoomRegistry>,
    channel_capacity: usize,
    idle_timeout: Option<Duration>,
    shutdown_token: CancellationToken,
    active: AtomicUsize,
    drained: Notify,
}

impl Hub {
    #[must_use]
    pub fn new(
        registry: Arc<RoomRegistry>,
        channel_capacity: usize,
        idle_timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            channel_capacity,
            idle_timeout,
            shutdown_token: CancellationToken::new(),
            active: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Live participants across all rooms.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// `Connecting -> Active`: register a new client in `room_id`.
    ///
    /// Queues a `welcome` for the new client and a `peer-joined` for every
    /// other participant.
    ///
    /// # Errors
    ///
    /// - `RoomNotFound` if the room does not exist or was closed
    /// - `Unavailable` once shutdown has started
    #[instrument(
        skip_all,
        name = "relay.hub.connect",
        fields(room_id = %room_id, user_id = %identity.user_id)
    )]
    pub async fn connect(
        &self,
        identity: SessionIdentity,
        room_id: &str,
    ) -> Result<ClientSession, RelayError> {
        if self.is_shutting_down() {
            return Err(RelayError::Unavailable(
                "relay is shutting down".to_string(),
            ));
        }

        let room = self.registry.get(room_id).await?;
        let client_id = format!("client_{}", Uuid::new_v4().simple());
        let (channel, receiver) = SignalChannel::bounded(self.channel_capacity);
        let connection = ConnectionHandle::new(&client_id, &self.shutdown_token);

        let client = Client::new(
            client_id.clone(),
            identity.clone(),
            Arc::clone(&channel),
            connection.clone(),
        );
        let peer = client.summary();
        let greeting = Welcome {
            client_id: client_id.clone(),
            room_id: room.id().to_string(),
            participants: Vec::new(),
        };
        room.admit(client, |participants| {
            SignalEvent::new(SignalPayload::Welcome(Welcome {
                participants,
                ..greeting
            }))
        })
        .await?;
        connection.activate();
        self.active.fetch_add(1, Ordering::AcqRel);
        metrics::connection_opened();

        let joined = room
            .broadcast(
                &SignalEvent::new(SignalPayload::PeerJoined(peer)),
                Some(&client_id),
            )
            .await;
        record_notice_drops(SignalKind::PeerJoined, joined);

        info!(
            target: "relay.hub",
            room_id = %room.id(),
            client_id = %client_id,
            user_id = %identity.user_id,
            "Client connected"
        );

        Ok(ClientSession {
            room,
            client_id,
            identity,
            channel,
            receiver,
            connection,
        })
    }

    /// Run both pumps for `session` until the connection ends, then tear
    /// it down. Returns why the connection ended.
    #[instrument(
        skip_all,
        name = "relay.hub.serve",
        fields(room_id = %session.room.id(), client_id = %session.client_id)
    )]
    pub async fn serve<I, E, O>(
        &self,
        session: ClientSession,
        inbound: I,
        outbound: O,
    ) -> LeaveReason
    where
        I: Stream<Item = Result<String, E>> + Send,
        E: fmt::Display + Send,
        O: Sink<String> + Send + 'static,
        O::Error: fmt::Display + Send,
    {
        let ClientSession {
            room,
            client_id,
            channel,
            receiver,
            connection,
            ..
        } = session;

        let mut outbound_task = tokio::spawn(run_outbound(
            client_id.clone(),
            receiver,
            outbound,
            connection.token(),
        ));
        let mut outbound_finished = false;
        let mut inbound = std::pin::pin!(inbound);

        let reason = loop {
            tokio::select! {
                () = connection.cancelled() => {
                    break if self.is_shutting_down() {
                        LeaveReason::Shutdown
                    } else {
                        LeaveReason::Left
                    };
                }
                exit = &mut outbound_task => {
                    outbound_finished = true;
                    debug!(
                        target: "relay.hub",
                        client_id = %client_id,
                        exit = ?exit,
                        "Outbound pump stopped"
                    );
                    break LeaveReason::Disconnected;
                }
                () = idle_expiry(self.idle_timeout) => {
                    debug!(target: "relay.hub", client_id = %client_id, "Idle timeout");
                    break LeaveReason::Timeout;
                }
                frame = inbound.next() => match frame {
                    Some(Ok(text)) => {
                        let flow = Self::handle_frame(&room, &client_id, &channel, &text).await;
                        if flow == FrameFlow::Leave {
                            break LeaveReason::Left;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(
                            target: "relay.hub",
                            client_id = %client_id,
                            error = %e,
                            "Transport read failed"
                        );
                        break LeaveReason::Disconnected;
                    }
                    None => break LeaveReason::Disconnected,
                },
            }
        };

        // No-op when an administrative leave or shutdown already tore it down.
        if let Err(e) = self.teardown(&room, &client_id, reason).await {
            debug!(target: "relay.hub", client_id = %client_id, error = %e, "Already torn down");
        }
        connection.cancel();
        if !outbound_finished {
            if let Err(e) = outbound_task.await {
                warn!(
                    target: "relay.hub",
                    client_id = %client_id,
                    error = %e,
                    "Outbound pump task failed"
                );
            }
        }

        reason
    }

    /// Administrative leave for `client_id` in `room_id`.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` or `ClientNotFound`; a second leave for the same
    /// client reports `ClientNotFound`.
    pub async fn leave(&self, room_id: &str, client_id: &str) -> Result<PeerInfo, RelayError> {
        let room = self.registry.get(room_id).await?;
        self.teardown(&room, client_id, LeaveReason::Left).await
    }

    /// `Closing -> Closed`: remove the client, close its channel once,
    /// stop its pumps and tell the remaining peers.
    ///
    /// # Errors
    ///
    /// `ClientNotFound` if the client was already torn down.
    pub async fn teardown(
        &self,
        room: &Room,
        client_id: &str,
        reason: LeaveReason,
    ) -> Result<PeerInfo, RelayError> {
        let client = room.remove_client(client_id).await?;

        client.connection.begin_close();
        client.channel.close();
        client.connection.finish_close();
        metrics::connection_closed(reason.as_str(), client.connection.age());
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }

        let peer = client.summary();
        let notice = SignalEvent::new(SignalPayload::PeerLeft(PeerLeft {
            peer: peer.clone(),
            reason,
        }));
        let outcome = room.broadcast(&notice, None).await;
        record_notice_drops(SignalKind::PeerLeft, outcome);

        info!(
            target: "relay.hub",
            room_id = %room.id(),
            client_id = %client_id,
            user_id = %peer.user_id,
            reason = %reason,
            notified = outcome.delivered,
            "Client disconnected"
        );
        Ok(peer)
    }

    /// Cancel every live connection. Each serve loop tears down with
    /// reason `shutdown`; new connects are refused.
    pub fn shutdown(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!(
                target: "relay.hub",
                active_connections = self.active_connections(),
                "Hub shutting down"
            );
        }
        self.shutdown_token.cancel();
    }

    /// Wait until no connection is live or `deadline` passes.
    /// Returns `true` if drained in time.
    pub async fn wait_for_drain(&self, deadline: Instant) -> bool {
        let drained = async {
            loop {
                let notified = self.drained.notified();
                if self.active_connections() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout_at(deadline, drained).await.is_ok()
    }

    async fn handle_frame(
        room: &Room,
        client_id: &str,
        channel: &SignalChannel,
        frame: &str,
    ) -> FrameFlow {
        match SignalEvent::parse_inbound(frame) {
            Ok(SignalPayload::Leave) => FrameFlow::Leave,
            Ok(payload) => {
                SignalRouter::route(room, client_id, payload).await;
                FrameFlow::Continue
            }
            Err(e) => {
                warn!(
                    target: "relay.hub",
                    room_id = %room.id(),
                    client_id = %client_id,
                    error = %e,
                    "Rejected inbound frame"
                );
                metrics::record_parse_error(e.label());
                if let Err(send_err) =
                    channel.try_send(SignalEvent::error(INVALID_SIGNAL_CODE, e.to_string()))
                {
                    debug!(
                        target: "relay.hub",
                        client_id = %client_id,
                        error = %send_err,
                        "Error notice not queued"
                    );
                }
                FrameFlow::Continue
            }
        }
    }
}

/// Server notices share the drop counter with routed signals.
fn record_notice_drops(kind: SignalKind, outcome: BroadcastOutcome) {
    if outcome.dropped > 0 {
        metrics::record_deliveries_dropped(kind.as_str(), outcome.dropped as u64);
    }
}

async fn idle_expiry(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

#[instrument(skip_all, name = "relay.hub.outbound", fields(client_id = %client_id))]
async fn run_outbound<O>(
    client_id: String,
    mut receiver: SignalReceiver,
    outbound: O,
    cancel: CancellationToken,
) -> PumpExit
where
    O: Sink<String> + Send,
    O::Error: fmt::Display + Send,
{
    let mut outbound = std::pin::pin!(outbound);

    let exit = loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break PumpExit::Cancelled,
            event = receiver.recv() => event,
        };
        let Some(event) = event else {
            break PumpExit::ChannelClosed;
        };

        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    target: "relay.hub",
                    client_id = %client_id,
                    error = %e,
                    "Failed to encode event"
                );
                continue;
            }
        };

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => break PumpExit::Cancelled,
            sent = outbound.send(frame) => sent,
        };
        if let Err(e) = sent {
            debug!(
                target: "relay.hub",
                client_id = %client_id,
                error = %e,
                "Transport write failed"
            );
            break PumpExit::WriteFailed;
        }
    };

    if let Err(e) = outbound.close().await {
        debug!(target: "relay.hub", client_id = %client_id, error = %e, "Transport close failed");
    }
    exit
}
