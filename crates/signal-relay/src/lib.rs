//! Signal Relay Service Library
//!
//! Room-scoped signaling relay for real-time peer sessions. Clients join a
//! room over a WebSocket and exchange opaque offer/answer/ICE-candidate
//! events; the relay fans each event out to every other participant in the
//! room and tracks membership under concurrent joins and departures.
//!
//! # Architecture
//!
//! ```text
//! RoomRegistry (one per process, RwLock over the room map)
//! └── Room (RwLock over its own client map)
//!     └── Client
//!         ├── SignalChannel (bounded, drop-newest on full)
//!         └── ConnectionHandle (state + cancellation)
//!
//! Hub (connection lifecycle)
//! ├── inbound pump:  transport -> parse -> SignalRouter -> peers' channels
//! └── outbound pump: own channel -> transport (sole writer)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Best-effort fan-out**: a full peer queue drops the event and counts
//!   it; a slow peer never stalls the sender or the room lock
//! - **Single writer**: only the outbound pump writes to a transport
//! - **Exactly-once teardown**: whoever removes the client from its room
//!   closes the channel and notifies peers
//! - **Process-local state**: nothing survives a restart
//!
//! # Modules
//!
//! - [`rooms`] - Registry, rooms, clients and signal channels
//! - [`hub`] - Connection lifecycle, pumps and fan-out routing
//! - [`signaling`] - Wire shapes of signaling events
//! - [`auth`] - Session tokens and accounts
//! - [`chat`], [`recording`] - Collaborator stores
//! - [`routes`], [`handlers`], [`middleware`] - HTTP and WebSocket surface
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with HTTP mapping

pub mod auth;
pub mod chat;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod hub;
pub mod middleware;
pub mod observability;
pub mod recording;
pub mod rooms;
pub mod routes;
pub mod signaling;
pub mod tasks;
