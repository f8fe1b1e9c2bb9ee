//! Error types for the Chain Reaction server.

use thiserror::Error;

/// Errors that can occur while running the Chain Reaction server.
///
/// Game-rule rejections are not errors in this sense: they are reported to
/// clients (see [`JoinRejection`](crate::room::JoinRejection)) or dropped
/// silently (see [`MoveRejection`](crate::session::MoveRejection)).
#[derive(Debug, Error)]
pub enum ChainReactionError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a protocol message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The listener could not be bound to the configured address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address the server attempted to bind.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for Chain Reaction server operations.
pub type Result<T> = std::result::Result<T, ChainReactionError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_convert_to_serialization() {
        let err: ChainReactionError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ChainReactionError::Serialization(_)));
        assert!(err.to_string().starts_with("serialization error:"));
    }
}
