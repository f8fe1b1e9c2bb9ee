//! Wire protocol types for the Chain Reaction server.
//!
//! Every message is a JSON object whose `type` field names the variant;
//! the remaining fields sit next to it in camelCase:
//!
//! ```json
//! {"type":"move","roomCode":"K3ZQ7A","playerId":"alice","x":0,"y":0}
//! ```
//!
//! Player slots (cell owners, the winner) use `-1` for "nobody", matching
//! what existing browser clients expect.

use serde::{Deserialize, Serialize};

use crate::error_codes::ErrorCode;
use crate::grid::{Grid, PlayerIndex};

// ── Type aliases ────────────────────────────────────────────────────

/// Client-chosen player identity. Opaque to the server.
pub type PlayerId = String;

/// Short uppercase code that identifies a live room.
pub type RoomCode = String;

// ── Player slot encoding ────────────────────────────────────────────

/// Serde adapter mapping `Option<PlayerIndex>` to an integer, `-1` for `None`.
pub(crate) mod player_slot {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::grid::PlayerIndex;

    pub fn serialize<S: Serializer>(
        slot: &Option<PlayerIndex>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match slot {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PlayerIndex>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        if raw < 0 {
            return Ok(None);
        }
        PlayerIndex::try_from(raw).map(Some).map_err(D::Error::custom)
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// Authoritative snapshot of a running match, broadcast after every
/// accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    pub grid: Grid,
    /// Index of the player whose turn it is.
    pub turn: PlayerIndex,
    pub move_count: u32,
    /// Indexed by [`PlayerIndex`]; fixed length for the whole match.
    pub eliminated: Vec<bool>,
    pub game_over: bool,
    #[serde(with = "player_slot")]
    pub winner: Option<PlayerIndex>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room and become its host.
    ///
    /// Requested dimensions are signed so that negative values parse and get
    /// clamped like any other out-of-range size.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid_rows: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grid_cols: Option<i64>,
    },
    /// Join an existing room by code.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    /// Host request to start the match.
    #[serde(rename_all = "camelCase")]
    StartGame {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    /// Place an orb at column `x`, row `y`.
    ///
    /// Coordinates are signed so that off-board values from clients parse and
    /// are rejected as out of bounds rather than as malformed input.
    #[serde(rename_all = "camelCase")]
    Move {
        room_code: RoomCode,
        player_id: PlayerId,
        x: i64,
        y: i64,
    },
    /// Leave the room.
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        room_code: RoomCode,
        player_id: PlayerId,
    },
    /// Any `type` this server does not understand.
    #[serde(other)]
    Unrecognized,
}

impl ClientMessage {
    /// Wire name of the message type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::StartGame { .. } => "start_game",
            Self::Move { .. } => "move",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room created; sent to the creator only.
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
        grid_rows: u32,
        grid_cols: u32,
    },
    /// Join accepted; sent to the joiner only.
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: RoomCode,
        player_id: PlayerId,
        players: Vec<PlayerId>,
        grid_rows: u32,
        grid_cols: u32,
    },
    /// Player list after someone joined; broadcast to the room.
    PlayerJoined { players: Vec<PlayerId> },
    /// Player list after someone left; broadcast to the remaining members.
    PlayerLeft { players: Vec<PlayerId> },
    /// Match started. `players` is the permanent turn order.
    #[serde(rename_all = "camelCase")]
    GameStart {
        players: Vec<PlayerId>,
        grid_rows: u32,
        grid_cols: u32,
    },
    /// Full match state after a move or a forfeit.
    GameState { state: GameStateSnapshot },
    /// Request rejected; sent to the requester only.
    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
}

impl ServerMessage {
    /// Build an `error` message for a rejection code.
    pub fn rejection(code: ErrorCode) -> Self {
        Self::Error {
            message: code.message().to_string(),
            error_code: Some(code),
        }
    }
}
