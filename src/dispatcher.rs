//! Routes inbound client messages to room and match operations.
//!
//! The [`Dispatcher`] owns the [`RoomRegistry`] and is cheap to clone; every
//! connection task holds a clone. Each connection keeps a [`Connection`]
//! record naming the player and room it last created or joined, which is
//! used to leave the room when the connection closes.
//!
//! Outcomes follow three rules:
//!
//! - join failures are answered with an `error` message to the requester;
//! - illegal starts and moves are dropped without a reply;
//! - unparsable or unknown messages are logged and dropped.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::{broadcast, send_direct, send_to};
use crate::config::ServerConfig;
use crate::error_codes::ErrorCode;
use crate::protocol::{ClientMessage, PlayerId, RoomCode, ServerMessage};
use crate::registry::RoomRegistry;
use crate::room::{LeaveOutcome, Sink};

// ── Connection record ───────────────────────────────────────────────

/// Player and room a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    player: PlayerId,
    room_code: RoomCode,
}

/// Per-connection state owned by the transport side.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    sink: Sink,
    binding: Option<Binding>,
}

impl Connection {
    /// New connection delivering outbound messages to `sink`.
    pub fn new(sink: Sink) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink,
            binding: None,
        }
    }

    /// Identifier used in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Player id recorded at the last successful create or join.
    pub fn player(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.player.as_str())
    }

    /// Room code recorded at the last successful create or join.
    pub fn room_code(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.room_code.as_str())
    }

    fn is_bound_to(&self, room_code: &str, player: &str) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|b| b.room_code == room_code && b.player == player)
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Message router shared by all connections.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<RoomRegistry>,
    config: Arc<ServerConfig>,
}

impl Dispatcher {
    /// Create a dispatcher with an empty registry.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new(&config)),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Parse and handle one raw text frame.
    pub async fn handle_text(&self, conn: &mut Connection, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(conn, message).await,
            Err(e) => {
                warn!(connection = %conn.id, "failed to parse client message: {e}");
            }
        }
    }

    /// Handle one client message to completion.
    pub async fn handle(&self, conn: &mut Connection, message: ClientMessage) {
        debug!(connection = %conn.id, kind = message.kind(), "handling client message");
        match message {
            ClientMessage::CreateRoom {
                player_id,
                grid_rows,
                grid_cols,
            } => self.create_room(conn, player_id, grid_rows, grid_cols).await,
            ClientMessage::JoinRoom {
                room_code,
                player_id,
            } => self.join_room(conn, room_code, player_id).await,
            ClientMessage::StartGame {
                room_code,
                player_id,
            } => self.start_game(&room_code, &player_id).await,
            ClientMessage::Move {
                room_code,
                player_id,
                x,
                y,
            } => self.apply_move(&room_code, &player_id, x, y).await,
            ClientMessage::LeaveRoom {
                room_code,
                player_id,
            } => {
                if conn.is_bound_to(&room_code, &player_id) {
                    conn.binding = None;
                }
                self.leave_room(&room_code, &player_id, None).await;
            }
            ClientMessage::Unrecognized => {
                warn!(connection = %conn.id, "ignoring message with unrecognized type");
            }
        }
    }

    /// Treat a closed connection as leaving its recorded room.
    ///
    /// Nothing happens if the recorded player id now belongs to a different
    /// connection.
    pub async fn disconnect(&self, conn: &mut Connection) {
        if let Some(binding) = conn.binding.take() {
            info!(
                connection = %conn.id,
                room = %binding.room_code,
                player = %binding.player,
                "connection closed, leaving room"
            );
            self.leave_room(&binding.room_code, &binding.player, Some(&conn.sink))
                .await;
        }
    }

    async fn create_room(
        &self,
        conn: &mut Connection,
        player: PlayerId,
        grid_rows: Option<i64>,
        grid_cols: Option<i64>,
    ) {
        let (rows, cols) = self.config.grid_dimensions(grid_rows, grid_cols);
        let (code, _) = self
            .registry
            .create_room(player.clone(), conn.sink.clone(), (rows, cols))
            .await;
        info!(room = %code, player = %player, rows, cols, "room created");

        self.rebind(conn, code.clone(), player.clone()).await;
        send_direct(
            &conn.sink,
            &ServerMessage::RoomCreated {
                room_code: code,
                player_id: player,
                grid_rows: rows,
                grid_cols: cols,
            },
        );
    }

    async fn join_room(&self, conn: &mut Connection, code: RoomCode, player: PlayerId) {
        let Some(handle) = self.registry.lookup(&code).await else {
            debug!(room = %code, player = %player, "join rejected: no such room");
            send_direct(
                &conn.sink,
                &ServerMessage::rejection(ErrorCode::RoomNotFound),
            );
            return;
        };

        {
            let mut room = handle.lock().await;
            if let Err(rejection) = room.join(player.clone(), conn.sink.clone()) {
                debug!(room = %code, player = %player, "join rejected: {rejection}");
                send_direct(&conn.sink, &ServerMessage::rejection(rejection.code()));
                return;
            }
            info!(room = %code, player = %player, players = room.players().len(), "player joined");

            send_to(
                &room,
                &player,
                &ServerMessage::RoomJoined {
                    room_code: code.clone(),
                    player_id: player.clone(),
                    players: room.players().to_vec(),
                    grid_rows: room.grid_rows(),
                    grid_cols: room.grid_cols(),
                },
            );
            broadcast(
                &room,
                &ServerMessage::PlayerJoined {
                    players: room.players().to_vec(),
                },
            );
        }

        self.rebind(conn, code, player).await;
    }

    async fn start_game(&self, code: &str, player: &str) {
        let Some(handle) = self.registry.lookup(code).await else {
            debug!(room = %code, player = %player, "start ignored: no such room");
            return;
        };
        let mut room = handle.lock().await;
        let players = match room.start(player, self.config.cascade_limit) {
            Ok(session) => session.roster().to_vec(),
            Err(rejection) => {
                debug!(room = %code, player = %player, "start ignored: {rejection}");
                return;
            }
        };
        let started = ServerMessage::GameStart {
            players,
            grid_rows: room.grid_rows(),
            grid_cols: room.grid_cols(),
        };
        info!(room = %code, players = room.players().len(), "match started");
        broadcast(&room, &started);
    }

    async fn apply_move(&self, code: &str, player: &str, x: i64, y: i64) {
        let Some(handle) = self.registry.lookup(code).await else {
            debug!(room = %code, player = %player, "move ignored: no such room");
            return;
        };
        let mut room = handle.lock().await;
        let Some(session) = room.session_mut() else {
            debug!(room = %code, player = %player, "move ignored: match not started");
            return;
        };

        let outcome = match session.apply_move(player, x, y) {
            Ok(outcome) => outcome,
            Err(rejection) => {
                debug!(room = %code, player = %player, x, y, "move ignored: {rejection}");
                return;
            }
        };
        let snapshot = session.snapshot();

        debug!(
            room = %code,
            player = %player,
            x,
            y,
            passes = outcome.cascade.passes,
            bursts = outcome.cascade.bursts,
            "move applied"
        );
        for index in &outcome.newly_eliminated {
            info!(room = %code, player_index = index, "player eliminated");
        }
        if let Some(winner) = outcome.winner {
            info!(room = %code, winner, moves = snapshot.move_count, "match over");
        }

        broadcast(&room, &ServerMessage::GameState { state: snapshot });
    }

    /// Remove `player` from room `code`. With `owner` set, the player is only
    /// removed while their messages still go to that sink.
    async fn leave_room(&self, code: &str, player: &str, owner: Option<&Sink>) {
        let Some(handle) = self.registry.lookup(code).await else {
            debug!(room = %code, player = %player, "leave ignored: no such room");
            return;
        };

        let mut room = handle.lock().await;
        if let Some(owner) = owner {
            if !room
                .recipient(player)
                .is_some_and(|sink| sink.same_channel(owner))
            {
                debug!(room = %code, player = %player, "leave ignored: player owned by another connection");
                return;
            }
        }
        match room.leave(player) {
            LeaveOutcome::NotMember => {
                debug!(room = %code, player = %player, "leave ignored: not a member");
            }
            LeaveOutcome::Emptied => {
                drop(room);
                self.registry.remove(code).await;
                info!(room = %code, player = %player, "last player left, room deleted");
            }
            LeaveOutcome::Left {
                host_changed,
                forfeited,
            } => {
                info!(
                    room = %code,
                    player = %player,
                    host = %room.host(),
                    host_changed,
                    forfeited,
                    "player left"
                );
                broadcast(
                    &room,
                    &ServerMessage::PlayerLeft {
                        players: room.players().to_vec(),
                    },
                );
                if forfeited {
                    if let Some(snapshot) = room.session().map(|s| s.snapshot()) {
                        broadcast(&room, &ServerMessage::GameState { state: snapshot });
                    }
                }
            }
        }
    }

    /// Record a new binding, leaving the previously bound room if it differs.
    async fn rebind(&self, conn: &mut Connection, room_code: RoomCode, player: PlayerId) {
        let binding = Binding { player, room_code };
        if let Some(previous) = conn.binding.replace(binding) {
            if conn.binding.as_ref() != Some(&previous) {
                debug!(
                    connection = %conn.id,
                    room = %previous.room_code,
                    player = %previous.player,
                    "connection moved rooms, leaving previous room"
                );
                self.leave_room(&previous.room_code, &previous.player, Some(&conn.sink))
                    .await;
            }
        }
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
    use tokio::sync::mpsc;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(json) = rx.try_recv() {
            out.push(serde_json::from_str(&json).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn create_binds_connection() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (mut conn, mut rx) = connection();

        dispatcher
            .handle_text(&mut conn, r#"{"type":"create_room","playerId":"alice"}"#)
            .await;

        let messages = drain(&mut rx);
        let [ServerMessage::RoomCreated { room_code, .. }] = messages.as_slice() else {
            panic!("expected RoomCreated, got {messages:?}");
        };
        assert_eq!(conn.room_code(), Some(room_code.as_str()));
        assert_eq!(conn.player(), Some("alice"));
    }

    #[tokio::test]
    async fn malformed_text_is_dropped() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (mut conn, mut rx) = connection();

        dispatcher.handle_text(&mut conn, "{not json").await;
        dispatcher.handle_text(&mut conn, r#"{"type":"dance"}"#).await;

        assert!(drain(&mut rx).is_empty());
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn creating_a_second_room_leaves_the_first() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (mut conn, mut rx) = connection();

        dispatcher
            .handle_text(&mut conn, r#"{"type":"create_room","playerId":"alice"}"#)
            .await;
        let first = conn.room_code().unwrap().to_string();
        dispatcher
            .handle_text(&mut conn, r#"{"type":"create_room","playerId":"alice"}"#)
            .await;
        drain(&mut rx);

        assert_ne!(conn.room_code(), Some(first.as_str()));
        assert!(dispatcher.registry().lookup(&first).await.is_none());
        assert_eq!(dispatcher.registry().len().await, 1);
    }

    #[tokio::test]
    async fn disconnect_without_binding_is_noop() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (mut conn, mut rx) = connection();
        dispatcher.disconnect(&mut conn).await;
        assert!(drain(&mut rx).is_empty());
    }
}
