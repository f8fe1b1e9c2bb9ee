//! Connection loop and listener.
//!
//! [`serve_connection`] drives one client: inbound frames go to the
//! [`Dispatcher`], and everything the dispatcher queues on the connection's
//! sink is written back out. When the client goes away the connection leaves
//! its room exactly as if it had sent `leave_room`.
//!
//! With the `transport-websocket` feature, [`ChainReactionServer`] accepts
//! WebSocket clients on a TCP listener and spawns one connection loop each.
//!
//! # Example
//!
//! ```rust,ignore
//! let server = ChainReactionServer::bind(ServerConfig::from_env()).await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::dispatcher::{Connection, Dispatcher};
use crate::transport::Transport;

/// Serve one connected client until it disconnects.
///
/// Exits when:
/// - The transport returns `None` (client closed the connection)
/// - A transport receive or send error occurs
pub async fn serve_connection(mut transport: impl Transport, dispatcher: Dispatcher) {
    let (sink, mut outbound) = mpsc::unbounded_channel::<String>();
    let mut conn = Connection::new(sink);
    debug!(connection = %conn.id(), "connection loop started");

    loop {
        tokio::select! {
            // Flush queued replies before reading the next request.
            biased;

            // Branch 1: outgoing message queued by the dispatcher
            Some(payload) = outbound.recv() => {
                if let Err(e) = transport.send(payload).await {
                    error!(connection = %conn.id(), "transport send error: {e}");
                    break;
                }
            }

            // Branch 2: incoming message from the client
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => dispatcher.handle_text(&mut conn, &text).await,
                    Some(Err(e)) => {
                        warn!(connection = %conn.id(), "transport receive error: {e}");
                        break;
                    }
                    None => {
                        debug!(connection = %conn.id(), "transport closed by client");
                        break;
                    }
                }
            }
        }
    }

    dispatcher.disconnect(&mut conn).await;
    if let Err(e) = transport.close().await {
        debug!(connection = %conn.id(), "transport close failed: {e}");
    }
    debug!(connection = %conn.id(), "connection loop exited");
}

#[cfg(feature = "transport-websocket")]
pub use listener::ChainReactionServer;

#[cfg(feature = "transport-websocket")]
mod listener {
    use std::future::Future;
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tracing::{debug, error, info, warn};

    use super::serve_connection;
    use crate::config::ServerConfig;
    use crate::dispatcher::Dispatcher;
    use crate::error::{ChainReactionError, Result};
    use crate::transports::WebSocketTransport;

    /// WebSocket server accepting Chain Reaction clients.
    #[derive(Debug)]
    pub struct ChainReactionServer {
        listener: TcpListener,
        dispatcher: Dispatcher,
        handshake_timeout: Duration,
    }

    impl ChainReactionServer {
        /// Bind the listener to `config.bind_address`.
        ///
        /// # Errors
        ///
        /// Returns [`ChainReactionError::Bind`] if the address cannot be bound.
        pub async fn bind(config: ServerConfig) -> Result<Self> {
            let listener = TcpListener::bind(&config.bind_address)
                .await
                .map_err(|source| ChainReactionError::Bind {
                    address: config.bind_address.clone(),
                    source,
                })?;
            Ok(Self {
                listener,
                handshake_timeout: config.handshake_timeout,
                dispatcher: Dispatcher::new(config),
            })
        }

        /// Address the listener is bound to.
        ///
        /// # Errors
        ///
        /// Returns [`ChainReactionError::Io`] if the socket cannot report it.
        pub fn local_addr(&self) -> Result<SocketAddr> {
            Ok(self.listener.local_addr()?)
        }

        pub fn dispatcher(&self) -> &Dispatcher {
            &self.dispatcher
        }

        /// Accept clients forever.
        ///
        /// # Errors
        ///
        /// Currently never returns an error; accept failures are logged and
        /// the loop keeps going.
        pub async fn run(self) -> Result<()> {
            self.run_until(std::future::pending()).await
        }

        /// Accept clients until `shutdown` resolves.
        ///
        /// Connections already being served keep running on their own tasks.
        ///
        /// # Errors
        ///
        /// Currently never returns an error; accept failures are logged and
        /// the loop keeps going.
        pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested, no longer accepting connections");
                        return Ok(());
                    }
                    accepted = self.listener.accept() => {
                        match accepted {
                            Ok((stream, addr)) => self.spawn_connection(stream, addr),
                            Err(e) => error!("failed to accept connection: {e}"),
                        }
                    }
                }
            }
        }

        fn spawn_connection(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
            let dispatcher = self.dispatcher.clone();
            let timeout = self.handshake_timeout;
            tokio::spawn(async move {
                match WebSocketTransport::accept_with_timeout(stream, timeout).await {
                    Ok(transport) => {
                        debug!(%addr, "WebSocket client connected");
                        serve_connection(transport, dispatcher).await;
                        debug!(%addr, "WebSocket client disconnected");
                    }
                    Err(ChainReactionError::Timeout) => {
                        warn!(%addr, ?timeout, "WebSocket handshake timed out");
                    }
                    Err(e) => warn!(%addr, "WebSocket handshake failed: {e}"),
                }
            });
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
    use crate::config::ServerConfig;
    use crate::error::ChainReactionError;
    use crate::protocol::ServerMessage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Client side of a [`ChannelTransport`].
    struct Peer {
        to_server: mpsc::UnboundedSender<String>,
        from_server: mpsc::UnboundedReceiver<String>,
    }

    impl Peer {
        fn send(&self, json: &str) {
            self.to_server.send(json.to_string()).unwrap();
        }

        async fn next(&mut self) -> ServerMessage {
            let json = self.from_server.recv().await.expect("server message");
            serde_json::from_str(&json).unwrap()
        }
    }

    struct ChannelTransport {
        inbound: mpsc::UnboundedReceiver<String>,
        outbound: mpsc::UnboundedSender<String>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), ChainReactionError> {
            self.outbound
                .send(message)
                .map_err(|e| ChainReactionError::TransportSend(e.to_string()))
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, ChainReactionError>> {
            self.inbound.recv().await.map(Ok)
        }

        async fn close(&mut self) -> std::result::Result<(), ChainReactionError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    fn channel_pair() -> (ChannelTransport, Peer, Arc<AtomicBool>) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = ChannelTransport {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        };
        (transport, Peer { to_server, from_server }, closed)
    }

    #[tokio::test]
    async fn replies_are_written_to_the_transport() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (transport, mut peer, _closed) = channel_pair();
        let task = tokio::spawn(serve_connection(transport, dispatcher.clone()));

        peer.send(r#"{"type":"create_room","playerId":"alice","gridRows":5,"gridCols":5}"#);
        let ServerMessage::RoomCreated {
            grid_rows,
            grid_cols,
            ..
        } = peer.next().await
        else {
            panic!("expected RoomCreated");
        };
        assert_eq!((grid_rows, grid_cols), (5, 5));

        drop(peer);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn client_close_leaves_room_and_closes_transport() {
        let dispatcher = Dispatcher::new(ServerConfig::default());
        let (transport, mut peer, closed) = channel_pair();
        let task = tokio::spawn(serve_connection(transport, dispatcher.clone()));

        peer.send(r#"{"type":"create_room","playerId":"alice"}"#);
        let ServerMessage::RoomCreated { room_code, .. } = peer.next().await else {
            panic!("expected RoomCreated");
        };
        assert!(dispatcher.registry().lookup(&room_code).await.is_some());

        drop(peer);
        task.await.unwrap();

        assert!(closed.load(Ordering::Relaxed));
        assert!(dispatcher.registry().lookup(&room_code).await.is_none());
    }
}
