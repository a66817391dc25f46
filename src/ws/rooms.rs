//! Room resolution for the subscribe handshake.

use crate::ws::Feed;

/// Room joined by the chat feed.
pub const CHAT_ROOM: &str = "chat_room_2";

/// Mode → room table for the games feed.
pub const GAME_ROOMS: &[(&str, &str)] = &[
    ("crash", "crash_room_4"),
    ("doubles", "double_room_1"),
    ("crash_2", "crash_room_1"),
    ("crash_neymarjr", "crash_room_3"),
];

/// Room for a game mode, or `None` if the mode is unknown.
pub fn room_for_mode(mode: &str) -> Option<&'static str> {
    GAME_ROOMS
        .iter()
        .find(|(known, _)| *known == mode)
        .map(|(_, room)| *room)
}

/// Room the handshake subscribes to for a feed.
///
/// Chat ignores the mode. Returns `Err(mode)` for an unknown game mode.
pub fn resolve_room<'a>(feed: Feed, mode: &'a str) -> Result<&'static str, &'a str> {
    match feed {
        Feed::Chat => Ok(CHAT_ROOM),
        Feed::Games => room_for_mode(mode).ok_or(mode),
    }
}
