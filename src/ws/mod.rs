//! WebSocket layer: frames, dedup, dispatch, keepalive and the session.
//!
//! The transport is pluggable through [`transport::Transport`]:
//! - `ws-native` feature → `tokio-tungstenite` (native.rs)
//! - tests and embedders can supply their own implementation
//!
//! This module defines the shared event, state and configuration types.

pub mod dedup;
pub mod dispatch;
pub mod frame;
pub mod headers;
pub mod keepalive;
pub mod rooms;
pub mod session;
pub mod stream;
pub mod transport;

#[cfg(feature = "ws-native")]
pub mod native;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, CrashTick, CrashTickBets, DoubleTick};
use crate::network;

pub use dedup::{DedupCache, DedupDecision};
pub use dispatch::Dispatcher;
pub use frame::{DecodedEvent, OutboundFrame};
pub use session::BlazeClient;
pub use stream::EventStream;
pub use transport::{RawMessage, Transport, TransportSignal};

// ─── Event names ─────────────────────────────────────────────────────────────

pub const CRASH_TICK: &str = "crash.tick";
pub const CRASH_TICK_BETS: &str = "crash.tick-bets";
pub const DOUBLE_TICK: &str = "double.tick";
pub const CHAT_MESSAGE: &str = "chat.message";

/// Emitted once per Open with the rooms subscribed during the handshake.
pub const SUBSCRIPTIONS: &str = "subscriptions";
/// Emitted whenever a session closes, with the code and reconnect flag.
pub const CLOSE: &str = "close";
/// Emitted for asynchronous failures (unknown mode, transport errors, failed reconnects).
pub const ERROR: &str = "error";

/// Prefix of the raw correlation channel used in dedup mode.
pub const RAW_PREFIX: &str = "CB:";

/// Name of the raw correlation channel for an event (`CB:<name>`).
///
/// In dedup mode every decoded payload is emitted here, suppressed or not.
pub fn raw_channel(event_name: &str) -> String {
    format!("{}{}", RAW_PREFIX, event_name)
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Close notification synthesized from the transport's close signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    pub code: u16,
    /// Whether the client will reconnect on its own.
    pub reconnect: bool,
}

/// Normal closure, used when the transport reports no code.
pub const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownMode,
    Transport,
    Reconnect,
}

/// Payload of the `error` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything a subscriber can receive, keyed by event name in the dispatcher.
#[derive(Debug, Clone)]
pub enum Event {
    CrashTick(CrashTick),
    CrashTickBets(CrashTickBets),
    DoubleTick(DoubleTick),
    ChatMessage(ChatMessage),
    Subscriptions(Vec<String>),
    Close(CloseEvent),
    Error(ErrorEvent),
    /// A server event with no typed model, or whose payload did not match it.
    Unrecognized {
        name: String,
        payload: serde_json::Value,
    },
}

impl Event {
    /// Build the typed event for a decoded server payload.
    ///
    /// Falls back to [`Event::Unrecognized`] when the name is unknown or the
    /// payload does not fit the typed model; the raw value is never lost.
    pub fn from_payload(name: &str, payload: serde_json::Value) -> Self {
        let typed = match name {
            CRASH_TICK => CrashTick::deserialize(&payload).map(Self::CrashTick),
            CRASH_TICK_BETS => CrashTickBets::deserialize(&payload).map(Self::CrashTickBets),
            DOUBLE_TICK => DoubleTick::deserialize(&payload).map(Self::DoubleTick),
            CHAT_MESSAGE => ChatMessage::deserialize(&payload).map(Self::ChatMessage),
            _ => {
                return Self::Unrecognized {
                    name: name.to_string(),
                    payload,
                }
            }
        };

        typed.unwrap_or_else(|e| {
            tracing::debug!("Payload for '{}' did not match its model: {}", name, e);
            Self::Unrecognized {
                name: name.to_string(),
                payload,
            }
        })
    }

    pub fn as_crash_tick(&self) -> Option<&CrashTick> {
        match self {
            Self::CrashTick(tick) => Some(tick),
            _ => None,
        }
    }

    pub fn as_double_tick(&self) -> Option<&DoubleTick> {
        match self {
            Self::DoubleTick(tick) => Some(tick),
            _ => None,
        }
    }

    pub fn as_close(&self) -> Option<&CloseEvent> {
        match self {
            Self::Close(close) => Some(close),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// An event together with the channel name it was emitted on.
#[derive(Debug, Clone)]
pub struct DispatchedEvent {
    pub name: String,
    pub event: Arc<Event>,
}

// ─── Session state ───────────────────────────────────────────────────────────

/// Connection state owned by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

impl From<u8> for SessionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which replication channel a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    /// Game rooms, resolved from the connect mode.
    #[default]
    Games,
    /// The public chat room.
    Chat,
}

impl Feed {
    /// Key into the static address table.
    pub fn address_key(&self) -> &'static str {
        match self {
            Self::Games => "games",
            Self::Chat => "general",
        }
    }
}

/// Per-instance client configuration. Fixed for the client's lifetime.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Suppress repeated statuses for the same entity on the named channel.
    pub dedup: bool,
    /// Maximum number of entity ids remembered by the dedup cache. `None` is unbounded.
    pub dedup_capacity: Option<usize>,
    /// Number of dispatch workers running subscriber callbacks.
    pub dispatch_workers: usize,
    /// Capacity of the dispatch job queue. Jobs beyond it are dropped.
    pub dispatch_queue_capacity: usize,
    /// Capacity of each [`EventStream`] returned by `events()`.
    pub event_stream_capacity: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            dedup: true,
            dedup_capacity: None,
            dispatch_workers: 4,
            dispatch_queue_capacity: 1024,
            event_stream_capacity: 256,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = Some(capacity.max(1));
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers.max(1);
        self
    }

    /// Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_dispatch_queue_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_queue_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_event_stream_capacity(mut self, capacity: usize) -> Self {
        self.event_stream_capacity = capacity.max(1);
        self
    }
}

/// Parameters of a connect call. Reused verbatim for every reconnect.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub address: Option<String>,
    pub feed: Feed,
    /// Game mode used to resolve the room (`crash`, `doubles`, `crash_2`, `crash_neymarjr`).
    pub mode: String,
    pub token: Option<String>,
    pub reconnect: bool,
    /// Delay before the first reconnect attempt.
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub keepalive_interval: Duration,
    /// Extra headers. Override the built-in defaults by name, case-insensitively.
    pub headers: Vec<(String, String)>,
    pub host: Option<String>,
    pub origin: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            address: None,
            feed: Feed::Games,
            mode: "crash".to_string(),
            token: None,
            reconnect: false,
            reconnect_delay: Duration::from_millis(100),
            max_reconnect_attempts: 10,
            keepalive_interval: Duration::from_millis(10_000),
            headers: Vec::new(),
            host: None,
            origin: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectOptions {
    /// Game feed for `mode`, addressed at the default games endpoint.
    pub fn games(mode: impl Into<String>) -> Self {
        Self {
            address: network::address_for(Feed::Games.address_key()).map(str::to_string),
            feed: Feed::Games,
            mode: mode.into(),
            ..Default::default()
        }
    }

    /// Chat feed, addressed at the default general endpoint.
    pub fn chat() -> Self {
        Self {
            address: network::address_for(Feed::Chat.address_key()).map(str::to_string),
            feed: Feed::Chat,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// A zero interval is raised to 1 ms.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
