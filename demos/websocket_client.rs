//! # WebSocket Client Example
//!
//! Connects to a running `chain-reaction-server`, creates a room and prints
//! every message the server sends until Ctrl+C. Open a second terminal and
//! join the printed room code from the browser client to watch the lobby
//! updates arrive.
//!
//! ## Running
//!
//! ```sh
//! cargo run --bin chain-reaction-server &
//! cargo run --example websocket_client -- ws://127.0.0.1:3001
//! ```

use chain_reaction_server::ServerMessage;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::Message;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:3001".to_string());
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await?;
    tracing::info!("connected to {url}");

    let create = json!({ "type": "create_room", "playerId": "demo-host" });
    ws.send(Message::Text(create.to_string().into())).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = ws.next() => {
                let Some(frame) = frame else { break };
                let Message::Text(text) = frame? else { continue };
                match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(ServerMessage::RoomCreated { room_code, grid_rows, grid_cols, .. }) => {
                        tracing::info!("room {room_code} created ({grid_rows}x{grid_cols}), share this code");
                    }
                    Ok(ServerMessage::PlayerJoined { players }) => {
                        tracing::info!("players now: {}", players.join(", "));
                    }
                    Ok(other) => tracing::info!("server: {other:?}"),
                    Err(e) => tracing::warn!("unparsable server frame: {e}"),
                }
            }
        }
    }

    ws.close(None).await?;
    Ok(())
}
