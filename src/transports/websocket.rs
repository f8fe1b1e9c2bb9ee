//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! This module provides [`WebSocketTransport`], the server side of one
//! WebSocket client connection. The listener in
//! [`ChainReactionServer`](crate::server::ChainReactionServer) accepts TCP
//! streams and upgrades them here.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), chain_reaction_server::ChainReactionError> {
//! use chain_reaction_server::{Transport, WebSocketTransport};
//! use tokio::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:3001").await?;
//! let (stream, _) = listener.accept().await?;
//! let mut transport = WebSocketTransport::accept(stream).await?;
//!
//! if let Some(Ok(msg)) = transport.recv().await {
//!     println!("received: {msg}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::ChainReactionError;
use crate::transport::Transport;

/// Type alias for the underlying server-side WebSocket stream.
pub type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A [`Transport`] implementation backed by an accepted WebSocket connection.
///
/// # Construction
///
/// Use [`WebSocketTransport::accept`] to run the handshake on a freshly
/// accepted TCP stream. If the handshake is done elsewhere (custom headers,
/// subprotocol negotiation), wrap the result with
/// [`WebSocketTransport::from_stream`].
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not consume or lose any messages,
/// making it safe to use inside `tokio::select!`.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Perform the WebSocket handshake on an accepted TCP stream.
    ///
    /// # Errors
    ///
    /// Returns [`ChainReactionError::Io`] if the handshake fails. When the
    /// underlying error is an I/O error its [`ErrorKind`](std::io::ErrorKind)
    /// is preserved; all other errors are mapped to
    /// [`ErrorKind::InvalidData`](std::io::ErrorKind::InvalidData).
    pub async fn accept(stream: TcpStream) -> Result<Self, ChainReactionError> {
        let peer = stream.peer_addr().ok();
        let stream = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::InvalidData,
            };
            ChainReactionError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::debug!(?peer, "WebSocket handshake completed");
        Ok(Self::from_stream(stream))
    }

    /// Perform the handshake, failing with [`ChainReactionError::Timeout`] if
    /// the client does not complete it within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainReactionError::Timeout`] if the deadline elapses, or any
    /// error that [`accept`](Self::accept) may return.
    pub async fn accept_with_timeout(
        stream: TcpStream,
        timeout: Duration,
    ) -> Result<Self, ChainReactionError> {
        tokio::time::timeout(timeout, Self::accept(stream))
            .await
            .map_err(|_| ChainReactionError::Timeout)?
    }

    /// Wrap an already-upgraded WebSocket stream.
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), ChainReactionError> {
        if self.closed {
            return Err(ChainReactionError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| ChainReactionError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, ChainReactionError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(ChainReactionError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    return None;
                }
                // tungstenite queues the pong itself.
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    tracing::debug!("received raw WebSocket frame, skipping");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChainReactionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            // The client already finished the close handshake.
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(ChainReactionError::TransportSend(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    /// Accept one client on an ephemeral port, returning both ends.
    async fn connected_pair() -> (WebSocketTransport, ClientStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            WebSocketTransport::accept(tcp).await.unwrap()
        });
        let (client, _response) = connect_async(format!("ws://{addr}")).await.unwrap();
        (server.await.unwrap(), client)
    }

    #[tokio::test]
    async fn recv_receives_text_messages() {
        let (mut transport, mut client) = connected_pair().await;
        client.send(Message::Text("hello".into())).await.unwrap();
        client.send(Message::Text("world".into())).await.unwrap();

        assert_eq!(transport.recv().await.unwrap().unwrap(), "hello");
        assert_eq!(transport.recv().await.unwrap().unwrap(), "world");
    }

    #[tokio::test]
    async fn recv_returns_none_on_close_frame() {
        let (mut transport, mut client) = connected_pair().await;
        client.close(None).await.unwrap();
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_and_ping_frames() {
        let (mut transport, mut client) = connected_pair().await;
        client
            .send(Message::Binary(vec![0xDE, 0xAD].into()))
            .await
            .unwrap();
        client.send(Message::Ping(vec![1].into())).await.unwrap();
        client
            .send(Message::Text("after_binary".into()))
            .await
            .unwrap();

        assert_eq!(transport.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn send_reaches_client() {
        let (mut transport, mut client) = connected_pair().await;
        transport
            .send(r#"{"type":"player_joined","players":["a"]}"#.to_string())
            .await
            .unwrap();

        let Some(Ok(Message::Text(text))) = client.next().await else {
            panic!("expected a text frame");
        };
        assert_eq!(text.as_str(), r#"{"type":"player_joined","players":["a"]}"#);
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let (mut transport, _client) = connected_pair().await;
        transport.close().await.unwrap();

        let err = transport.send("oops".to_string()).await.unwrap_err();
        assert!(matches!(err, ChainReactionError::TransportClosed));
    }

    #[tokio::test]
    async fn double_close_is_idempotent() {
        let (mut transport, _client) = connected_pair().await;
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn handshake_times_out_when_client_stays_silent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _silent = TcpStream::connect(addr).await.unwrap();
        let (tcp, _) = listener.accept().await.unwrap();

        let err = WebSocketTransport::accept_with_timeout(tcp, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainReactionError::Timeout));
    }

    #[tokio::test]
    async fn handshake_rejects_plain_http() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut raw = TcpStream::connect(addr).await.unwrap();
        raw.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let (tcp, _) = listener.accept().await.unwrap();

        let err = WebSocketTransport::accept(tcp).await.unwrap_err();
        assert!(matches!(err, ChainReactionError::Io(_)));
    }
}
