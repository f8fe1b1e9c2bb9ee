//! # Loopback Match Example
//!
//! Serves two in-process clients through [`serve_connection`] using a
//! channel-backed [`Transport`], then plays a short match on a 2×2 board.
//! No sockets are involved, so this is also the quickest way to watch the
//! server's logs for a complete game.
//!
//! ## Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --example loopback_match
//! ```

use async_trait::async_trait;
use chain_reaction_server::{
    serve_connection, ChainReactionError, Dispatcher, ServerConfig, ServerMessage, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Server half of the loopback, handed to [`serve_connection`].
struct LoopbackTransport {
    /// Frames the client sent.
    rx: mpsc::UnboundedReceiver<String>,
    /// Frames for the client.
    tx: mpsc::UnboundedSender<String>,
}

/// Client half of the loopback.
struct LoopbackClient {
    name: &'static str,
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

fn loopback_pair(name: &'static str) -> (LoopbackTransport, LoopbackClient) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            rx: server_rx,
            tx: server_tx,
        },
        LoopbackClient {
            name,
            tx: client_tx,
            rx: client_rx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), ChainReactionError> {
        self.tx
            .send(message)
            .map_err(|e| ChainReactionError::TransportSend(e.to_string()))
    }

    /// Cancel-safe because `mpsc::UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, ChainReactionError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), ChainReactionError> {
        Ok(())
    }
}

impl LoopbackClient {
    fn send(&self, message: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
        self.tx.send(message.to_string())?;
        Ok(())
    }

    async fn next(&mut self) -> Result<ServerMessage, Box<dyn std::error::Error>> {
        let Some(json) = self.rx.recv().await else {
            return Err(format!("{}: connection closed", self.name).into());
        };
        let message: ServerMessage = serde_json::from_str(&json)?;
        tracing::info!("{} <- {json}", self.name);
        Ok(message)
    }

    /// Read until a `game_state` arrives.
    async fn next_state(
        &mut self,
    ) -> Result<chain_reaction_server::GameStateSnapshot, Box<dyn std::error::Error>> {
        loop {
            if let ServerMessage::GameState { state } = self.next().await? {
                return Ok(state);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Serve both clients and play
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dispatcher = Dispatcher::new(ServerConfig::default());
    let (alice_transport, mut alice) = loopback_pair("alice");
    let (bob_transport, mut bob) = loopback_pair("bob");
    tokio::spawn(serve_connection(alice_transport, dispatcher.clone()));
    tokio::spawn(serve_connection(bob_transport, dispatcher.clone()));

    // ── Lobby ───────────────────────────────────────────────────────
    alice.send(json!({ "type": "create_room", "playerId": "alice", "gridRows": 2, "gridCols": 2 }))?;
    let ServerMessage::RoomCreated { room_code, .. } = alice.next().await? else {
        return Err("expected room_created".into());
    };

    bob.send(json!({ "type": "join_room", "roomCode": room_code, "playerId": "bob" }))?;
    bob.next().await?; // room_joined
    bob.next().await?; // player_joined
    alice.next().await?; // player_joined

    alice.send(json!({ "type": "start_game", "roomCode": room_code, "playerId": "alice" }))?;
    alice.next().await?;
    bob.next().await?;

    // ── Match ───────────────────────────────────────────────────────
    // Alice overloads the top-left corner; the cascade sweeps the board.
    let script = [("alice", 0, 0), ("bob", 1, 0), ("alice", 0, 0)];
    for (player, x, y) in script {
        let client = if player == "alice" { &alice } else { &bob };
        client.send(json!({
            "type": "move",
            "roomCode": room_code,
            "playerId": player,
            "x": x,
            "y": y,
        }))?;
        let state = alice.next_state().await?;
        bob.next_state().await?;

        for row in state.grid.rows_iter() {
            let line: Vec<String> = row
                .iter()
                .map(|cell| match cell.owner {
                    Some(owner) => format!("{owner}:{}", cell.count),
                    None => " . ".to_string(),
                })
                .collect();
            tracing::info!("  {}", line.join(" "));
        }
        if state.game_over {
            tracing::info!(winner = ?state.winner, moves = state.move_count, "match over");
            break;
        }
    }

    // ── Leave ───────────────────────────────────────────────────────
    bob.send(json!({ "type": "leave_room", "roomCode": room_code, "playerId": "bob" }))?;
    alice.next().await?; // player_left
    alice.send(json!({ "type": "leave_room", "roomCode": room_code, "playerId": "alice" }))?;
    while !dispatcher.registry().is_empty().await {
        tokio::task::yield_now().await;
    }
    tracing::info!("Done. Room {room_code} was removed after the last player left.");
    Ok(())
}
