//! Room registry, rooms, clients and their signal channels.

pub mod channel;
pub mod registry;
pub mod room;

pub use channel::{ChannelError, SignalChannel, SignalReceiver};
pub use registry::RoomRegistry;
pub use room::{BroadcastOutcome, Client, Room, RoomSummary};

/// Maximum length of a room identifier.
pub const MAX_ROOM_ID_LEN: usize = 128;

/// Room ids end up in URLs and file names: ASCII alphanumerics, `_` and `-`.
#[must_use]
pub fn is_valid_room_id(room_id: &str) -> bool {
    !room_id.is_empty()
        && room_id.len() <= MAX_ROOM_ID_LEN
        && room_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_validation() {
        assert!(is_valid_room_id("room_0f3a"));
        assert!(is_valid_room_id("daily-standup"));
        assert!(!is_valid_room_id(""));
        assert!(!is_valid_room_id("../etc"));
        assert!(!is_valid_room_id("a b"));
        assert!(!is_valid_room_id("a&token=x"));
        assert!(!is_valid_room_id(&"x".repeat(MAX_ROOM_ID_LEN + 1)));
    }
}
