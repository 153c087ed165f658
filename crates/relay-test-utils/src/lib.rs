//! # Relay Test Utilities
//!
//! Shared test utilities for the Signal Relay.
//!
//! ## Modules
//!
//! - `fixtures` - Test configuration, identities and a ready-made `AppState`
//! - `memory_transport` - In-memory stand-in for a WebSocket connection
//! - `http` - Request builders and body readers for router tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let relay = TestRelay::new();
//!     let room = relay.state.registry.create("standup", "user-a").await;
//!
//!     let hub = Arc::clone(&relay.state.hub);
//!     let session = hub.connect(TestUser::new("alice").identity(), room.id()).await.unwrap();
//!     let (mut peer, transport) = MemoryTransport::pair();
//!     tokio::spawn(async move {
//!         hub.serve(session, transport.inbound, transport.outbound).await
//!     });
//!
//!     let welcome = peer.next_event().await;
//! }
//! ```

pub mod fixtures;
pub mod http;
pub mod memory_transport;

pub use fixtures::*;
pub use memory_transport::*;
