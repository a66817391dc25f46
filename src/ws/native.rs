//! Native transport: `tokio-tungstenite`.
//!
//! Each `connect` performs the upgrade handshake and spawns a connection task
//! that owns the socket. The task forwards inbound frames as
//! [`TransportSignal`]s and serializes outbound frames from a command
//! channel, so `send` is safe to call from several tasks at once.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::ws::transport::{RawMessage, Transport, TransportSignal};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Capacity of the signal channel handed to the session.
const SIGNAL_CAPACITY: usize = 256;
/// Capacity of the outbound command channel.
const COMMAND_CAPACITY: usize = 64;

/// Handshake headers the WebSocket library generates itself.
const MANAGED_HEADERS: &[&str] = &[
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-extensions",
];

enum Command {
    Send(String),
    Disconnect,
}

/// [`Transport`] over `tokio-tungstenite`.
#[derive(Default)]
pub struct NativeTransport {
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NativeTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for NativeTransport {
    async fn connect(
        &self,
        address: &str,
        headers: &[(String, String)],
    ) -> Result<mpsc::Receiver<TransportSignal>, TransportError> {
        let mut request = address
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        for (name, value) in headers.iter().filter(|(name, _)| !is_managed(name)) {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidHeader(format!("{}: {}", name, e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidHeader(format!("{}: {}", name, e)))?;
            request.headers_mut().insert(header_name, header_value);
        }

        // A transport serves one connection at a time.
        self.close_current().await;

        let (stream, _) = connect_async(request).await?;
        let (sink, source) = stream.split();

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let _ = signal_tx.try_send(TransportSignal::Open);

        let handle = tokio::spawn(connection_task(sink, source, cmd_rx, signal_tx));
        *self.commands.lock().await = Some(cmd_tx);
        *self.task.lock().await = Some(handle);

        Ok(signal_rx)
    }

    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let tx = self
            .commands
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)?;
        tx.send(Command::Send(frame))
            .await
            .map_err(|_| TransportError::NotConnected)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let tx = self
            .commands
            .lock()
            .await
            .take()
            .ok_or(TransportError::NotConnected)?;

        let sent = tx.send(Command::Disconnect).await;
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }

        sent.map_err(|_| TransportError::NotConnected)
    }
}

impl NativeTransport {
    async fn close_current(&self) {
        if let Some(tx) = self.commands.lock().await.take() {
            let _ = tx.send(Command::Disconnect).await;
        }
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for NativeTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

fn is_managed(name: &str) -> bool {
    MANAGED_HEADERS
        .iter()
        .any(|managed| managed.eq_ignore_ascii_case(name))
}

// ─── Connection task ─────────────────────────────────────────────────────────

async fn connection_task(
    mut sink: WsSink,
    mut source: WsSource,
    mut cmd_rx: mpsc::Receiver<Command>,
    signals: mpsc::Sender<TransportSignal>,
) {
    loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let raw = RawMessage::Text(text.as_str().to_string());
                        let _ = signals.send(TransportSignal::Message(raw)).await;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let raw = RawMessage::Binary(data.to_vec());
                        let _ = signals.send(TransportSignal::Message(raw)).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = extract_close(frame.as_ref());
                        tracing::info!("Server closed the connection (code {:?})", code);
                        let _ = signals.try_send(TransportSignal::Close(code));
                        return;
                    }
                    Some(Ok(_)) => {} // Pong, raw frames
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        let _ = signals.try_send(TransportSignal::Error(e.into()));
                        let _ = signals.try_send(TransportSignal::Close(None));
                        return;
                    }
                    None => {
                        let _ = signals.try_send(TransportSignal::Close(None));
                        return;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            tracing::warn!("Send failed: {}", e);
                        }
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        let _ = signals.try_send(TransportSignal::Close(Some(CloseCode::Normal.into())));
                        return;
                    }
                }
            }
        }
    }
}

/// Close code from an optional close frame.
fn extract_close(frame: Option<&CloseFrame>) -> Option<u16> {
    frame.map(|f| f.code.into())
}
