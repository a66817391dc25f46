//! # Blaze SDK
//!
//! Rust client for the Blaze live game and chat feed.
//!
//! ## Architecture
//!
//! 1. **Core**: typed payloads, network constants, errors
//! 2. **Frames**: data-frame decoding and outbound command encoding
//! 3. **Session**: `BlazeClient` with status dedup, keepalive, reconnect and
//!    callback dispatch over a pluggable transport
//! 4. **Transport**: `tokio-tungstenite` (feature `ws-native`) or your own
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blaze_sdk::prelude::*;
//!
//! let client = BlazeClient::native(ClientOptions::default());
//! client.on(CRASH_TICK, |event| {
//!     if let Some(tick) = event.as_crash_tick() {
//!         println!("{} {} {:?}", tick.id, tick.status, tick.crash_point());
//!     }
//! });
//! client.connect(ConnectOptions::games("crash")).await?;
//! ```

// ── Core ─────────────────────────────────────────────────────────────────────

/// Shared field types and serde helpers.
pub mod shared;

/// Typed payloads: crash, double, chat.
pub mod domain;

/// SDK error types.
pub mod error;

/// Endpoint and header constants.
pub mod network;

// ── WebSocket ────────────────────────────────────────────────────────────────

/// Frames, dedup, dispatch, keepalive, session and transports.
pub mod ws;

/// Next-round collector.
pub mod round;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared + domain types
    pub use crate::domain::{
        Bet, ChatMessage, ChatUser, CrashTick, CrashTickBets, DoubleColor, DoubleTick, RoundStatus,
    };
    pub use crate::shared::Scalar;

    // Errors
    pub use crate::error::{ClientError, ClientResult, TransportError};

    // Network
    pub use crate::network::{GAMES_WS_URL, GENERAL_WS_URL};

    // WebSocket types
    pub use crate::ws::{
        raw_channel, BlazeClient, ClientOptions, CloseEvent, ConnectOptions, DispatchedEvent,
        ErrorEvent, ErrorKind, Event, EventStream, Feed, SessionState, Transport,
        TransportSignal, CHAT_MESSAGE, CLOSE, CRASH_TICK, CRASH_TICK_BETS, DOUBLE_TICK, ERROR,
        SUBSCRIPTIONS,
    };

    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::NativeTransport;

    // Helpers
    pub use crate::round::{next_round, RoundTick};
}
