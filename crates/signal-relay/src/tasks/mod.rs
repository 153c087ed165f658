//! Background tasks for Signal Relay.
//!
//! - `room_reaper` - Removes rooms that have stayed empty past a TTL
//! - `shutdown` - Drains connections and the server within one grace period

pub mod room_reaper;
pub mod shutdown;

pub use room_reaper::start_room_reaper;
pub use shutdown::{drain_within, DrainOutcome};
