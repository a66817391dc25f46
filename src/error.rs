//! Error types for the Blaze SDK.

use thiserror::Error;

/// Errors surfaced by [`BlazeClient`](crate::ws::session::BlazeClient).
///
/// Only [`ClientError::MissingAddress`] and [`ClientError::Transport`] are ever
/// returned synchronously from `connect`. Everything else reaches consumers
/// through the `error` event.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Missing target address")]
    MissingAddress,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Not connected")]
    NotConnected,

    #[error("Missing type of socket: unknown mode '{0}'")]
    UnknownMode(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Internal channel closed")]
    ChannelClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection closed before the round started")]
    RoundNotStarted,

    #[error("Deadline elapsed")]
    DeadlineElapsed,
}

/// Errors raised by a [`Transport`](crate::ws::transport::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("WebSocket protocol error: {0}")]
    Protocol(String),
}

#[cfg(feature = "ws-native")]
impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => TransportError::NotConnected,
            Error::Io(e) => TransportError::ConnectionFailed(e.to_string()),
            Error::Url(e) => TransportError::InvalidUrl(e.to_string()),
            Error::Http(resp) => {
                TransportError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => TransportError::ConnectionFailed(e.to_string()),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
