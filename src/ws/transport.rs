//! Transport capability consumed by the session controller.
//!
//! A transport owns the physical connection. It reports lifecycle and
//! inbound traffic as [`TransportSignal`]s on the channel returned from
//! [`Transport::connect`], and accepts outbound text frames through
//! [`Transport::send`], which must be callable concurrently from the
//! keepalive task and the session task.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// An inbound frame as delivered by the underlying socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    Text(String),
    Binary(Vec<u8>),
    /// Ping/pong or any other frame type the decoder never looks at.
    Other,
}

/// Events a transport reports for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// The handshake completed and frames may be sent.
    Open,
    Message(RawMessage),
    /// The connection closed, with the peer's close code if it sent one.
    Close(Option<u16>),
    /// A non-fatal transport error. A `Close` follows if the connection is lost.
    Error(TransportError),
}

/// A pluggable connection to the feed.
///
/// Every call to [`connect`](Transport::connect) starts a new connection and
/// returns a fresh signal channel. Dropping the channel's sender ends the
/// session as if `Close(None)` had been received.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(
        &self,
        address: &str,
        headers: &[(String, String)],
    ) -> Result<mpsc::Receiver<TransportSignal>, TransportError>;

    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Close the current connection.
    ///
    /// Returns [`TransportError::NotConnected`] when there is nothing to close.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
