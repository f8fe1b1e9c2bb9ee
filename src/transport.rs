//! Transport abstraction for client connections.
//!
//! The [`Transport`] trait is a bidirectional text message channel between
//! the server and one client. The protocol uses JSON text messages, so every
//! transport implementation must handle message framing internally (e.g.,
//! WebSocket frames, length-prefixed TCP).
//!
//! # Connection Setup
//!
//! Accepting connections is NOT part of this trait. Accept and handshake a
//! client however the transport requires, then hand the connected transport to
//! [`serve_connection`](crate::server::serve_connection).
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use chain_reaction_server::error::ChainReactionError;
//! use chain_reaction_server::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), ChainReactionError> {
//!         // Send the JSON text message to the client
//!         unimplemented!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, ChainReactionError>> {
//!         // Receive the next JSON text message
//!         // Return None when the client closed the connection cleanly
//!         unimplemented!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), ChainReactionError> {
//!         // Gracefully shut down the connection
//!         unimplemented!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::ChainReactionError;

/// A bidirectional text message transport to one client.
///
/// Each call to [`send`](Transport::send) transmits one complete JSON message.
/// Each call to [`recv`](Transport::recv) returns one complete JSON message.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because the
/// connection loop uses it inside `tokio::select!`. If `recv` is cancelled
/// before completion, calling it again must not lose data. Channel-based
/// implementations (e.g., wrapping `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send a JSON text message to the client.
    ///
    /// # Errors
    ///
    /// Returns [`ChainReactionError::TransportSend`] if the message could not
    /// be sent, or [`ChainReactionError::TransportClosed`] after
    /// [`close`](Transport::close).
    async fn send(&mut self, message: String) -> Result<(), ChainReactionError>;

    /// Receive the next JSON text message from the client.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete message was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the client closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, ChainReactionError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// still release resources in that case.
    async fn close(&mut self) -> Result<(), ChainReactionError>;
}
