//! # Chain Reaction Server
//!
//! Authoritative room and match server for the multiplayer Chain Reaction grid
//! game.
//!
//! Clients exchange JSON text messages with the server over any bidirectional
//! transport. The server owns every room, validates every move, resolves
//! chain-reaction cascades and broadcasts the resulting game state to the
//! players in the room.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement the [`Transport`] trait for any backend
//!   and hand connections to [`server::serve_connection`]
//! - **WebSocket built-in**: the default `transport-websocket` feature provides
//!   `WebSocketTransport`, `ChainReactionServer` and the
//!   `chain-reaction-server` binary
//! - **Deterministic rules**: [`Grid`] and [`GameSession`] are plain data and
//!   can be driven without any networking
//!
//! ## Layout
//!
//! | Module          | Role                                              |
//! |-----------------|---------------------------------------------------|
//! | [`grid`]        | board, critical mass, orb placement, cascades     |
//! | [`session`]     | turn order, elimination, winner                   |
//! | [`room`]        | membership, host, start                           |
//! | [`registry`]    | room codes and the live room table                |
//! | [`dispatcher`]  | routing client messages to the above              |
//! | [`broadcast`]   | delivering server messages to room members        |
//! | [`server`]      | per-connection loop and the WebSocket listener    |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), chain_reaction_server::ChainReactionError> {
//! use chain_reaction_server::{ChainReactionServer, ServerConfig};
//!
//! let server = ChainReactionServer::bind(ServerConfig::from_env()).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod error_codes;
pub mod grid;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use config::ServerConfig;
pub use dispatcher::{Connection, Dispatcher};
pub use error::ChainReactionError;
pub use error_codes::ErrorCode;
pub use grid::{Cell, Grid};
pub use protocol::{ClientMessage, GameStateSnapshot, ServerMessage};
pub use registry::RoomRegistry;
pub use server::serve_connection;
pub use session::GameSession;
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use server::ChainReactionServer;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
