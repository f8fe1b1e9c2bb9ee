//! Rooms: the player roster, host, recipients and the optional match.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::error_codes::ErrorCode;
use crate::protocol::{PlayerId, RoomCode};
use crate::session::GameSession;

/// Outbound channel for one connection. Carries serialized JSON messages.
pub type Sink = mpsc::UnboundedSender<String>;

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinRejection {
    #[error("room not found")]
    RoomNotFound,
    #[error("game already started")]
    GameAlreadyStarted,
    #[error("room is full")]
    RoomFull,
    #[error("player already in room")]
    AlreadyInRoom,
}

impl JoinRejection {
    /// Wire error code reported to the joiner.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound => ErrorCode::RoomNotFound,
            Self::GameAlreadyStarted => ErrorCode::GameAlreadyStarted,
            Self::RoomFull => ErrorCode::RoomFull,
            Self::AlreadyInRoom => ErrorCode::AlreadyInRoom,
        }
    }
}

/// Why a start request was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("requester is not the host")]
    NotHost,
    #[error("match already started")]
    AlreadyStarted,
    #[error("need at least 2 players, have {0}")]
    NotEnoughPlayers(usize),
}

/// Result of removing a player from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The player was not in the room; nothing changed.
    NotMember,
    /// The last player left. The room is closed and must be deregistered.
    Emptied,
    /// The player left and others remain.
    Left {
        /// The host role moved to the new first player.
        host_changed: bool,
        /// A running match recorded the departure as a forfeit.
        forfeited: bool,
    },
}

/// One game room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    host: PlayerId,
    players: Vec<PlayerId>,
    recipients: HashMap<PlayerId, Sink>,
    grid_rows: u32,
    grid_cols: u32,
    max_players: usize,
    session: Option<GameSession>,
    closed: bool,
}

impl Room {
    /// Create a room whose only player, `host`, receives on `sink`.
    pub fn new(
        code: RoomCode,
        host: PlayerId,
        sink: Sink,
        (grid_rows, grid_cols): (u32, u32),
        max_players: usize,
    ) -> Self {
        let mut recipients = HashMap::new();
        recipients.insert(host.clone(), sink);
        Self {
            code,
            players: vec![host.clone()],
            host,
            recipients,
            grid_rows,
            grid_cols,
            max_players,
            session: None,
            closed: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Players in join order.
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn grid_rows(&self) -> u32 {
        self.grid_rows
    }

    pub fn grid_cols(&self) -> u32 {
        self.grid_cols
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut GameSession> {
        self.session.as_mut()
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// `true` once the last player has left.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_member(&self, player: &str) -> bool {
        self.players.iter().any(|p| p == player)
    }

    /// Sink of a connected member.
    pub fn recipient(&self, player: &str) -> Option<&Sink> {
        self.recipients.get(player)
    }

    /// Sinks of all connected members, in player order.
    pub fn recipients(&self) -> impl Iterator<Item = (&PlayerId, &Sink)> {
        self.players
            .iter()
            .filter_map(|p| self.recipients.get_key_value(p))
    }

    /// Add `player` to the room.
    ///
    /// # Errors
    ///
    /// Returns a [`JoinRejection`] if the room is closed, already playing,
    /// full, or already has a player with this id. The room is unchanged.
    pub fn join(&mut self, player: PlayerId, sink: Sink) -> Result<(), JoinRejection> {
        if self.closed {
            return Err(JoinRejection::RoomNotFound);
        }
        if self.session.is_some() {
            return Err(JoinRejection::GameAlreadyStarted);
        }
        if self.players.len() >= self.max_players {
            return Err(JoinRejection::RoomFull);
        }
        if self.is_member(&player) {
            return Err(JoinRejection::AlreadyInRoom);
        }
        self.recipients.insert(player.clone(), sink);
        self.players.push(player);
        Ok(())
    }

    /// Remove `player` from the room.
    pub fn leave(&mut self, player: &str) -> LeaveOutcome {
        let Some(position) = self.players.iter().position(|p| p == player) else {
            return LeaveOutcome::NotMember;
        };
        self.players.remove(position);
        self.recipients.remove(player);

        if self.players.is_empty() {
            self.closed = true;
            return LeaveOutcome::Emptied;
        }

        let mut host_changed = false;
        if self.host == player {
            if let Some(first) = self.players.first() {
                self.host = first.clone();
                host_changed = true;
            }
        }
        let forfeited = self
            .session
            .as_mut()
            .is_some_and(|session| session.forfeit(player));

        LeaveOutcome::Left {
            host_changed,
            forfeited,
        }
    }

    /// Start the match on behalf of `requester`.
    ///
    /// The current player order becomes the permanent turn order.
    ///
    /// # Errors
    ///
    /// Returns a [`StartRejection`] if the requester is not the host, the
    /// match already started, or fewer than two players are present.
    pub fn start(
        &mut self,
        requester: &str,
        cascade_limit: usize,
    ) -> Result<&GameSession, StartRejection> {
        if self.host != requester {
            return Err(StartRejection::NotHost);
        }
        if self.session.is_some() {
            return Err(StartRejection::AlreadyStarted);
        }
        if self.players.len() < 2 {
            return Err(StartRejection::NotEnoughPlayers(self.players.len()));
        }
        let session = GameSession::new(
            self.players.clone(),
            self.grid_rows as usize,
            self.grid_cols as usize,
            cascade_limit,
        );
        Ok(self.session.insert(session))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::grid::DEFAULT_CASCADE_LIMIT;

    fn sink() -> Sink {
        mpsc::unbounded_channel().0
    }

    fn room_with(players: &[&str]) -> Room {
        let mut room = Room::new("ABC123".into(), players[0].into(), sink(), (6, 9), 4);
        for p in &players[1..] {
            room.join((*p).into(), sink()).unwrap();
        }
        room
    }

    #[test]
    fn creator_is_host_and_only_player() {
        let room = room_with(&["alice"]);
        assert_eq!(room.code(), "ABC123");
        assert_eq!(room.host(), "alice");
        assert_eq!(room.players(), &["alice".to_string()]);
        assert!(room.recipient("alice").is_some());
        assert!(!room.is_started());
        assert_eq!((room.grid_rows(), room.grid_cols()), (6, 9));
    }

    #[test]
    fn fifth_player_is_rejected() {
        let mut room = room_with(&["a", "b", "c", "d"]);
        assert_eq!(room.join("e".into(), sink()), Err(JoinRejection::RoomFull));
        assert_eq!(room.players().len(), 4);
        assert!(room.recipient("e").is_none());
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut room = room_with(&["a", "b"]);
        assert_eq!(
            room.join("b".into(), sink()),
            Err(JoinRejection::AlreadyInRoom)
        );
        assert_eq!(room.players().len(), 2);
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut room = room_with(&["a", "b"]);
        room.start("a", DEFAULT_CASCADE_LIMIT).unwrap();
        assert_eq!(
            room.join("c".into(), sink()),
            Err(JoinRejection::GameAlreadyStarted)
        );
    }

    #[test]
    fn start_requires_host_and_two_players() {
        let mut solo = room_with(&["a"]);
        assert_eq!(
            solo.start("a", DEFAULT_CASCADE_LIMIT).unwrap_err(),
            StartRejection::NotEnoughPlayers(1)
        );
        assert!(!solo.is_started());

        let mut room = room_with(&["a", "b"]);
        assert_eq!(
            room.start("b", DEFAULT_CASCADE_LIMIT).unwrap_err(),
            StartRejection::NotHost
        );
        assert!(!room.is_started());

        let session = room.start("a", DEFAULT_CASCADE_LIMIT).unwrap();
        assert_eq!(session.roster(), &["a".to_string(), "b".to_string()]);
        assert_eq!(session.eliminated().len(), 2);
        assert_eq!(
            room.start("a", DEFAULT_CASCADE_LIMIT).unwrap_err(),
            StartRejection::AlreadyStarted
        );
    }

    #[test]
    fn last_player_leaving_closes_room() {
        let mut room = room_with(&["a"]);
        assert_eq!(room.leave("a"), LeaveOutcome::Emptied);
        assert!(room.is_closed());
        assert_eq!(
            room.join("b".into(), sink()),
            Err(JoinRejection::RoomNotFound)
        );
    }

    #[test]
    fn host_leaving_promotes_next_player() {
        let mut room = room_with(&["a", "b", "c"]);
        assert_eq!(
            room.leave("a"),
            LeaveOutcome::Left {
                host_changed: true,
                forfeited: false
            }
        );
        assert_eq!(room.host(), "b");
        assert_eq!(room.players(), &["b".to_string(), "c".to_string()]);
        assert!(room.recipient("a").is_none());
    }

    #[test]
    fn non_host_leaving_keeps_host() {
        let mut room = room_with(&["a", "b", "c"]);
        assert_eq!(
            room.leave("b"),
            LeaveOutcome::Left {
                host_changed: false,
                forfeited: false
            }
        );
        assert_eq!(room.host(), "a");
        assert_eq!(room.leave("b"), LeaveOutcome::NotMember);
    }

    #[test]
    fn leaving_mid_match_forfeits() {
        let mut room = room_with(&["a", "b", "c"]);
        room.start("a", DEFAULT_CASCADE_LIMIT).unwrap();
        assert_eq!(
            room.leave("b"),
            LeaveOutcome::Left {
                host_changed: false,
                forfeited: true
            }
        );
        let session = room.session().unwrap();
        assert_eq!(session.eliminated(), &[false, true, false]);
        // Roster keeps the start order even though `b` is gone.
        assert_eq!(session.roster().len(), 3);
    }

    #[test]
    fn recipients_follow_player_order() {
        let room = room_with(&["c", "a", "b"]);
        let order: Vec<&str> = room.recipients().map(|(p, _)| p.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
