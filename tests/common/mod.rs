#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Chain Reaction server integration tests.
//!
//! Provides a [`TestClient`] that drives the [`Dispatcher`] directly, a
//! channel-based [`ChannelTransport`] for exercising the connection loop, and
//! builders for the JSON messages browser clients send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chain_reaction_server::protocol::RoomCode;
use chain_reaction_server::{
    ChainReactionError, Connection, Dispatcher, GameStateSnapshot, ServerConfig, ServerMessage,
    Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

// ── TestClient ──────────────────────────────────────────────────────

/// One simulated client connection talking straight to a dispatcher.
pub struct TestClient {
    pub conn: Connection,
    rx: mpsc::UnboundedReceiver<String>,
    dispatcher: Dispatcher,
}

impl TestClient {
    pub fn new(dispatcher: &Dispatcher) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            conn: Connection::new(tx),
            rx,
            dispatcher: dispatcher.clone(),
        }
    }

    /// Send one raw JSON frame.
    pub async fn send(&mut self, json: impl Into<String>) {
        let text = json.into();
        self.dispatcher.handle_text(&mut self.conn, &text).await;
    }

    /// Simulate the connection closing.
    pub async fn disconnect(&mut self) {
        self.dispatcher.disconnect(&mut self.conn).await;
    }

    /// Everything delivered to this client so far.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(json) = self.rx.try_recv() {
            out.push(serde_json::from_str(&json).expect("server message parses"));
        }
        out
    }

    /// The latest `game_state` snapshot delivered, discarding everything else.
    pub fn last_state(&mut self) -> Option<GameStateSnapshot> {
        self.drain().into_iter().rev().find_map(|msg| match msg {
            ServerMessage::GameState { state } => Some(state),
            _ => None,
        })
    }

    /// Create a room as `player` and return its code.
    pub async fn create(&mut self, player: &str) -> RoomCode {
        self.send(create_room_json(player, None)).await;
        match self.drain().as_slice() {
            [ServerMessage::RoomCreated { room_code, .. }] => room_code.clone(),
            other => panic!("expected RoomCreated, got {other:?}"),
        }
    }
}

/// Dispatcher with default settings.
pub fn dispatcher() -> Dispatcher {
    Dispatcher::new(ServerConfig::default())
}

/// A room hosted by `players[0]` and joined by the rest, with all inboxes
/// drained.
pub async fn lobby(dispatcher: &Dispatcher, players: &[&str]) -> (RoomCode, Vec<TestClient>) {
    let mut clients: Vec<TestClient> = players.iter().map(|_| TestClient::new(dispatcher)).collect();
    let code = clients[0].create(players[0]).await;
    for (client, player) in clients.iter_mut().zip(players).skip(1) {
        client.send(join_room_json(&code, player)).await;
    }
    for client in &mut clients {
        client.drain();
    }
    (code, clients)
}

// ── JSON builders ───────────────────────────────────────────────────

pub fn create_room_json(player: &str, grid: Option<(u32, u32)>) -> String {
    let mut msg = json!({ "type": "create_room", "playerId": player });
    if let Some((rows, cols)) = grid {
        msg["gridRows"] = json!(rows);
        msg["gridCols"] = json!(cols);
    }
    msg.to_string()
}

pub fn join_room_json(code: &str, player: &str) -> String {
    json!({ "type": "join_room", "roomCode": code, "playerId": player }).to_string()
}

pub fn start_game_json(code: &str, player: &str) -> String {
    json!({ "type": "start_game", "roomCode": code, "playerId": player }).to_string()
}

pub fn move_json(code: &str, player: &str, x: i64, y: i64) -> String {
    json!({ "type": "move", "roomCode": code, "playerId": player, "x": x, "y": y }).to_string()
}

pub fn leave_room_json(code: &str, player: &str) -> String {
    json!({ "type": "leave_room", "roomCode": code, "playerId": player }).to_string()
}

// ── ChannelTransport ────────────────────────────────────────────────

/// A channel-backed transport for running `serve_connection` in tests.
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
    pub closed: Arc<AtomicBool>,
}

/// Client side of a [`ChannelTransport`].
pub struct Peer {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Peer, Arc<AtomicBool>) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        };
        let peer = Peer {
            to_server: Some(to_server),
            from_server,
        };
        (transport, peer, closed)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: String) -> Result<(), ChainReactionError> {
        self.outbound
            .send(message)
            .map_err(|e| ChainReactionError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ChainReactionError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ChainReactionError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Peer {
    pub fn send(&self, json: impl Into<String>) {
        self.to_server
            .as_ref()
            .expect("peer still open")
            .send(json.into())
            .expect("connection loop alive");
    }

    /// Wait for the next server message.
    pub async fn next(&mut self) -> ServerMessage {
        let json = tokio::time::timeout(std::time::Duration::from_secs(5), self.from_server.recv())
            .await
            .expect("server message within 5s")
            .expect("connection loop still sending");
        serde_json::from_str(&json).expect("server message parses")
    }

    /// Close the client side of the connection.
    pub fn hang_up(&mut self) {
        self.to_server = None;
    }
}

pub fn is_closed(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}
