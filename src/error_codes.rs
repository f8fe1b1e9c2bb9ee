//! Error codes for rejections reported back to clients.
//!
//! Codes serialize using `SCREAMING_SNAKE_CASE` and travel next to the
//! human-readable `message` of an `error` server message.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes sent alongside `error` messages.
///
/// Use [`message()`](ErrorCode::message) for the text shown to players and
/// [`description()`](ErrorCode::description) for a longer explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RoomNotFound,
    GameAlreadyStarted,
    RoomFull,
    AlreadyInRoom,
}

impl ErrorCode {
    /// Returns the short message clients display, e.g. `"Room is full"`.
    pub fn message(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "Room not found",
            Self::GameAlreadyStarted => "Game already started",
            Self::RoomFull => "Room is full",
            Self::AlreadyInRoom => "Player already in room",
        }
    }

    /// Returns a human-readable description of this error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::RoomNotFound => {
                "No live room has this code. Check the code or ask the host for a new one."
            }
            Self::GameAlreadyStarted => {
                "The match in this room is already running. Rooms cannot be joined after the start."
            }
            Self::RoomFull => "The room already holds the maximum number of players.",
            Self::AlreadyInRoom => {
                "A player with this id is already in the room. Pick a different player id."
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Produce the SCREAMING_SNAKE_CASE wire name for consistency with
        // serde serialization.
        let s = match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            Self::RoomFull => "ROOM_FULL",
            Self::AlreadyInRoom => "ALREADY_IN_ROOM",
        };
        f.write_str(s)
    }
}
