//! `chain-reaction-server` binary.
//!
//! Reads `HOST` and `PORT` from the environment, listens for WebSocket
//! clients and runs until Ctrl+C. Log verbosity follows `RUST_LOG`
//! (default `info`).

use chain_reaction_server::{ChainReactionServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    let server = ChainReactionServer::bind(config).await?;
    tracing::info!(address = %server.local_addr()?, "Chain Reaction server listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
