//! Session controller.
//!
//! [`BlazeClient`] owns one logical session at a time. `connect` validates the
//! address, opens the transport and hands the signal channel to a background
//! task which runs the handshake, feeds inbound frames through
//! decode → dedup → dispatch, keeps the connection alive and, when the
//! connection closes, either reconnects with the original parameters or
//! settles in [`SessionState::Disconnected`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ClientError, ClientResult, TransportError};
use crate::ws::dedup::DedupCache;
use crate::ws::dispatch::Dispatcher;
use crate::ws::frame::{self, authenticate_frames, DecodedEvent, OutboundFrame};
use crate::ws::headers::merge_headers;
use crate::ws::keepalive::Keepalive;
use crate::ws::rooms::resolve_room;
use crate::ws::stream::EventStream;
use crate::ws::transport::{RawMessage, Transport, TransportSignal};
use crate::ws::{
    raw_channel, ClientOptions, CloseEvent, ConnectOptions, ErrorEvent, ErrorKind, Event, Feed,
    SessionState, CLOSE, CLOSE_NORMAL, ERROR, SUBSCRIPTIONS,
};

/// How long `disconnect` waits for the session task to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for the reconnect backoff.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// State shared between the public handle and the session task.
struct Shared<T: Transport> {
    options: ClientOptions,
    transport: Arc<T>,
    dispatcher: Dispatcher,
    dedup: Option<Mutex<DedupCache>>,
    state: AtomicU8,
}

struct SessionHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Client for the live feed.
///
/// Cheap to clone; clones share the session, callbacks and dedup cache. The
/// running session stops once every clone has been dropped.
///
/// # Example
///
/// ```ignore
/// use blaze_sdk::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), ClientError> {
///     let client = BlazeClient::native(ClientOptions::default());
///
///     client.on(DOUBLE_TICK, |event| {
///         if let Some(tick) = event.as_double_tick() {
///             println!("{} {}", tick.id, tick.status);
///         }
///     });
///
///     client.connect(ConnectOptions::games("doubles")).await?;
///     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///     client.disconnect().await
/// }
/// ```
pub struct BlazeClient<T: Transport> {
    shared: Arc<Shared<T>>,
    session: Arc<tokio::sync::Mutex<Option<SessionHandle>>>,
}

impl<T: Transport> Clone for BlazeClient<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            session: Arc::clone(&self.session),
        }
    }
}

impl<T: Transport> BlazeClient<T> {
    /// Client with default options.
    ///
    /// Needs no runtime; callbacks start running once the client is used
    /// from inside one.
    pub fn new(transport: T) -> Self {
        Self::with_options(transport, ClientOptions::default())
    }

    pub fn with_options(transport: T, options: ClientOptions) -> Self {
        let dedup = options.dedup.then(|| {
            Mutex::new(match options.dedup_capacity {
                Some(capacity) => DedupCache::with_capacity(capacity),
                None => DedupCache::new(),
            })
        });
        let dispatcher = Dispatcher::new(options.dispatch_workers, options.dispatch_queue_capacity);

        Self {
            shared: Arc::new(Shared {
                options,
                transport: Arc::new(transport),
                dispatcher,
                dedup,
                state: AtomicU8::new(SessionState::Disconnected as u8),
            }),
            session: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Open a session.
    ///
    /// Fails synchronously only when the address is missing or the transport
    /// cannot connect. Everything after that, including an unknown mode, is
    /// reported through the `error` and `close` events. Calling `connect`
    /// while a session is running is a no-op.
    pub async fn connect(&self, opts: ConnectOptions) -> ClientResult<()> {
        let address = match opts.address.as_deref() {
            Some(address) if !address.is_empty() => address.to_string(),
            _ => return Err(ClientError::MissingAddress),
        };

        let mut session = self.session.lock().await;
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            tracing::info!("Session already running, ignoring connect");
            return Ok(());
        }

        self.shared.set_state(SessionState::Connecting);
        let headers = merge_headers(&opts);

        let signals = match self.shared.open_transport(&opts, &address, &headers).await {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", address, e);
                self.shared.set_state(SessionState::Disconnected);
                return Err(e.into());
            }
        };

        tracing::info!("Connected to {}", address);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_task(
            Arc::clone(&self.shared),
            SessionParams {
                opts,
                address,
                headers,
            },
            signals,
            shutdown_rx,
        ));
        *session = Some(SessionHandle { shutdown, task });

        Ok(())
    }

    /// Close the session without reconnecting.
    ///
    /// Emits `close` with code 1000 and `reconnect: false`. Returns
    /// [`ClientError::NotConnected`] if no session is running.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let handle = self.session.lock().await.take();
        let Some(SessionHandle { shutdown, mut task }) = handle else {
            return Err(ClientError::NotConnected);
        };
        if task.is_finished() {
            return Err(ClientError::NotConnected);
        }

        let _ = shutdown.send(true);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
            tracing::warn!("Session task did not stop in time, aborting");
            task.abort();
            self.shared.set_state(SessionState::Disconnected);
            self.shared.emit_final_close();
        }

        Ok(())
    }

    /// Send a raw text frame over the open connection.
    pub async fn send(&self, frame: impl Into<String>) -> ClientResult<()> {
        if self.state() != SessionState::Open {
            return Err(ClientError::NotConnected);
        }
        self.shared
            .transport
            .send(frame.into())
            .await
            .map_err(|e| match e {
                TransportError::NotConnected => ClientError::NotConnected,
                other => ClientError::SendFailed(other.to_string()),
            })
    }

    /// Register a callback for an event name.
    ///
    /// Names are server event ids (`crash.tick`, `double.tick`, ...), their
    /// raw channels (`CB:crash.tick`) or `subscriptions`, `close`, `error`.
    pub fn on<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.dispatcher.on(name, callback);
    }

    /// Emit an event to local subscribers, as if it came from the session.
    pub fn emit(&self, name: &str, event: Event) {
        self.shared.dispatcher.emit(name, event);
    }

    /// Stream of every event emitted from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(
            self.shared
                .dispatcher
                .subscribe_stream(self.shared.options.event_stream_capacity),
        )
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Callbacks dropped because the dispatch queue was full.
    pub fn dropped_events(&self) -> u64 {
        self.shared.dispatcher.dropped()
    }
}

#[cfg(feature = "ws-native")]
impl BlazeClient<crate::ws::native::NativeTransport> {
    /// Client over the `tokio-tungstenite` transport.
    pub fn native(options: ClientOptions) -> Self {
        Self::with_options(crate::ws::native::NativeTransport::new(), options)
    }
}

// ─── Shared state ────────────────────────────────────────────────────────────

impl<T: Transport> Shared<T> {
    fn state(&self) -> SessionState {
        SessionState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: SessionState) {
        let previous = SessionState::from(self.state.swap(state as u8, Ordering::SeqCst));
        if previous != state {
            tracing::debug!("Session state {:?} -> {:?}", previous, state);
        }
    }

    fn emit(&self, name: &str, event: Event) {
        self.dispatcher.emit(name, event);
    }

    /// `close` telling subscribers no further reconnect will happen.
    fn emit_final_close(&self) {
        self.emit(
            CLOSE,
            Event::Close(CloseEvent {
                code: CLOSE_NORMAL,
                reconnect: false,
            }),
        );
    }

    fn emit_error(&self, kind: ErrorKind, message: impl Into<String>) {
        self.emit(ERROR, Event::Error(ErrorEvent::new(kind, message)));
    }

    async fn open_transport(
        &self,
        opts: &ConnectOptions,
        address: &str,
        headers: &[(String, String)],
    ) -> Result<mpsc::Receiver<TransportSignal>, TransportError> {
        tokio::time::timeout(opts.connect_timeout, self.transport.connect(address, headers))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    /// Subscribe, authenticate and announce the subscribed rooms.
    async fn handshake(&self, opts: &ConnectOptions) {
        let mut rooms = Vec::new();

        match resolve_room(opts.feed, &opts.mode) {
            Ok(room) => {
                self.send_frame(&OutboundFrame::subscribe(room)).await;
                rooms.push(room.to_string());
            }
            Err(mode) => {
                tracing::warn!("Unknown mode '{}', not subscribing", mode);
                self.emit_error(
                    ErrorKind::UnknownMode,
                    ClientError::UnknownMode(mode.to_string()).to_string(),
                );
            }
        }

        if opts.feed == Feed::Games {
            if let Some(token) = &opts.token {
                for auth in authenticate_frames(token) {
                    self.send_frame(&auth).await;
                }
            }
        }

        tracing::info!("Subscribed to {:?}", rooms);
        self.emit(SUBSCRIPTIONS, Event::Subscriptions(rooms));
    }

    async fn send_frame(&self, outbound: &OutboundFrame) {
        let text = match outbound.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode {}: {}", frame_kind(outbound), e);
                return;
            }
        };

        tracing::debug!("Sending {}", frame_kind(outbound));
        if let Err(e) = self.transport.send(text).await {
            tracing::warn!("Failed to send {}: {}", frame_kind(outbound), e);
        }
    }

    /// Decode one inbound frame and dispatch it.
    fn handle_message(&self, feed: Feed, raw: &RawMessage) {
        let Some(DecodedEvent { event_id, payload }) = frame::decode(raw) else {
            tracing::debug!("Ignoring non-data frame");
            return;
        };

        let cache = match feed {
            Feed::Games => self.dedup.as_ref(),
            Feed::Chat => None,
        };

        let Some(cache) = cache else {
            self.emit(&event_id, Event::from_payload(&event_id, payload));
            return;
        };

        let decision = cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(&payload);
        let event = Arc::new(Event::from_payload(&event_id, payload));

        if decision.raw {
            self.dispatcher.emit(&raw_channel(&event_id), Arc::clone(&event));
        }
        if decision.primary {
            self.dispatcher.emit(&event_id, event);
        }
    }
}

/// Log label for an outbound frame. Never includes the token.
fn frame_kind(outbound: &OutboundFrame) -> String {
    match outbound {
        OutboundFrame::Heartbeat => "heartbeat".to_string(),
        OutboundFrame::Subscribe { room } => format!("subscribe ({})", room),
        OutboundFrame::Authenticate { envelope, .. } => format!("authenticate ({})", envelope),
    }
}

// ─── Session task ────────────────────────────────────────────────────────────

/// Connect parameters, reused verbatim on every reconnect.
struct SessionParams {
    opts: ConnectOptions,
    address: String,
    headers: Vec<(String, String)>,
}

enum SessionEnd {
    /// The transport closed, with its close code if any.
    Closed(Option<u16>),
    /// `disconnect` was called or every client handle was dropped.
    Shutdown,
}

async fn run_task<T: Transport>(
    shared: Arc<Shared<T>>,
    params: SessionParams,
    mut signals: mpsc::Receiver<TransportSignal>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        // ── 1. Serve the connection ──────────────────────────────────────
        let end = run_connected(&shared, &params.opts, &mut signals, &mut shutdown).await;
        drop(signals);

        // ── 2. Tear down (keepalive already stopped) ─────────────────────
        shared.set_state(SessionState::Closing);
        if let Err(e) = shared.transport.disconnect().await {
            tracing::debug!("Transport already closed: {}", e);
        }

        let (code, requested) = match end {
            SessionEnd::Closed(code) => (code.unwrap_or(CLOSE_NORMAL), false),
            SessionEnd::Shutdown => (CLOSE_NORMAL, true),
        };
        let should_reconnect = params.opts.reconnect && !requested;

        tracing::info!(
            "Connection closed (code {}, reconnect: {})",
            code,
            should_reconnect
        );
        shared.emit(
            CLOSE,
            Event::Close(CloseEvent {
                code,
                reconnect: should_reconnect,
            }),
        );

        if !should_reconnect {
            shared.set_state(SessionState::Disconnected);
            return;
        }

        // ── 3. Reconnect with the original parameters ────────────────────
        match reconnect(&shared, &params, &mut shutdown).await {
            Some(next) => signals = next,
            None => {
                // The last close promised a retry.
                shared.set_state(SessionState::Disconnected);
                shared.emit_final_close();
                return;
            }
        }
    }
}

/// Serve one connection until it closes or shutdown is requested.
async fn run_connected<T: Transport>(
    shared: &Shared<T>,
    opts: &ConnectOptions,
    signals: &mut mpsc::Receiver<TransportSignal>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let mut keepalive: Option<Keepalive> = None;

    let end = loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(TransportSignal::Open) if keepalive.is_some() => {
                    tracing::debug!("Duplicate open signal ignored");
                }
                Some(TransportSignal::Open) => {
                    shared.set_state(SessionState::Open);
                    shared.handshake(opts).await;
                    keepalive = Some(Keepalive::start(
                        Arc::clone(&shared.transport),
                        opts.keepalive_interval,
                    ));
                }
                Some(TransportSignal::Message(raw)) => shared.handle_message(opts.feed, &raw),
                Some(TransportSignal::Error(e)) => {
                    tracing::error!("Transport error: {}", e);
                    shared.emit_error(ErrorKind::Transport, e.to_string());
                }
                Some(TransportSignal::Close(code)) => break SessionEnd::Closed(code),
                None => break SessionEnd::Closed(None),
            },
            _ = shutdown.changed() => break SessionEnd::Shutdown,
        }
    };

    if let Some(mut keepalive) = keepalive {
        keepalive.stop().await;
    }
    end
}

/// Retry the transport until it connects, attempts run out or shutdown is requested.
///
/// The first attempt waits the configured delay; later ones back off
/// exponentially with jitter.
async fn reconnect<T: Transport>(
    shared: &Shared<T>,
    params: &SessionParams,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<mpsc::Receiver<TransportSignal>> {
    let opts = &params.opts;
    let max_attempts = opts.max_reconnect_attempts.max(1);
    let mut attempt: u32 = 0;

    shared.set_state(SessionState::Connecting);

    loop {
        let delay = reconnect_delay(opts.reconnect_delay, attempt);
        attempt += 1;
        tracing::info!(
            "Reconnect attempt {}/{} in {}ms",
            attempt,
            max_attempts,
            delay.as_millis()
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
        }

        let result = tokio::select! {
            result = shared.open_transport(opts, &params.address, &params.headers) => result,
            _ = shutdown.changed() => {
                let _ = shared.transport.disconnect().await;
                tracing::info!("Reconnect cancelled");
                return None;
            }
        };

        match result {
            Ok(signals) => {
                tracing::info!("Reconnected to {}", params.address);
                return Some(signals);
            }
            Err(e) => {
                tracing::warn!("Reconnect attempt {} failed: {}", attempt, e);
                shared.emit_error(
                    ErrorKind::Reconnect,
                    format!("Reconnect attempt {} failed: {}", attempt, e),
                );
                if attempt >= max_attempts {
                    tracing::warn!("Giving up after {} reconnect attempts", attempt);
                    return None;
                }
            }
        }
    }
}

/// Delay before reconnect attempt `attempt` (0-based).
fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    if attempt == 0 {
        return base;
    }

    let exp = attempt.min(10);
    let max_delay = base.saturating_mul(1u32 << exp).min(MAX_RECONNECT_DELAY);
    let jitter_ms = rand::thread_rng().gen_range(0..=max_delay.as_millis() as u64 / 2);
    (max_delay / 2 + Duration::from_millis(jitter_ms)).min(MAX_RECONNECT_DELAY)
}
