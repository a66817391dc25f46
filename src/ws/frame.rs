//! Frame codec for the feed's socket framing.
//!
//! Inbound data frames look like `42["data",{"payload":{…},"id":"crash.tick"}]`:
//! a numeric envelope prefix, the literal `"data"` tag and one JSON object.
//! Everything else on the channel (open, ping/pong, acks) is a control frame
//! and decodes to `None`.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ws::transport::RawMessage;

lazy_static::lazy_static! {
    /// `<digits>["data", <object>]`
    static ref DATA_FRAME: Regex = Regex::new(r#"^\d+\["data",\s*(\{.*\})\]$"#).unwrap();
}

/// Heartbeat frame sent by the keepalive timer.
pub const HEARTBEAT: &str = "2";

/// An application event extracted from a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Event name as sent in the body's `id` field.
    pub event_id: String,
    pub payload: serde_json::Value,
}

#[derive(Deserialize)]
struct DataBody {
    #[serde(default)]
    payload: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<String>,
}

/// Decode a raw transport message.
///
/// Binary frames are read as text. Frames of any other type never produce an event.
pub fn decode(raw: &RawMessage) -> Option<DecodedEvent> {
    match raw {
        RawMessage::Text(text) => decode_text(text),
        RawMessage::Binary(bytes) => decode_text(&String::from_utf8_lossy(bytes)),
        RawMessage::Other => None,
    }
}

/// Decode a text frame. `None` for anything that is not a well-formed data frame.
pub fn decode_text(text: &str) -> Option<DecodedEvent> {
    let body = DATA_FRAME.captures(text)?.get(1)?.as_str();
    let parsed: DataBody = serde_json::from_str(body).ok()?;

    let payload = parsed.payload.filter(|p| !p.is_null())?;
    let event_id = parsed.id.filter(|id| !id.is_empty())?;

    Some(DecodedEvent { event_id, payload })
}

// ─── Outbound frames ─────────────────────────────────────────────────────────

/// Frames the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Heartbeat,
    Subscribe { room: String },
    /// `envelope` is the numeric prefix (`423`, `422`, `420`).
    Authenticate { envelope: u16, token: String },
}

/// Envelope prefixes used for the authenticate command, in send order.
pub const AUTH_ENVELOPES: [u16; 3] = [423, 422, 420];

const COMMAND_ENVELOPE: u16 = 420;

#[derive(Serialize)]
struct Command<'a, P: Serialize> {
    id: &'a str,
    payload: P,
}

#[derive(Serialize)]
struct RoomPayload<'a> {
    room: &'a str,
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    token: &'a str,
}

impl OutboundFrame {
    pub fn subscribe(room: impl Into<String>) -> Self {
        Self::Subscribe { room: room.into() }
    }

    /// Serialize to the exact wire text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Heartbeat => Ok(HEARTBEAT.to_string()),
            Self::Subscribe { room } => command_frame(
                COMMAND_ENVELOPE,
                &Command {
                    id: "subscribe",
                    payload: RoomPayload { room },
                },
            ),
            Self::Authenticate { envelope, token } => command_frame(
                *envelope,
                &Command {
                    id: "authenticate",
                    payload: TokenPayload { token },
                },
            ),
        }
    }
}

/// The three authenticate variants, all of which are sent.
///
/// Servers disagree on which envelope they accept and the client cannot tell
/// which one was honoured.
pub fn authenticate_frames(token: &str) -> [OutboundFrame; 3] {
    AUTH_ENVELOPES.map(|envelope| OutboundFrame::Authenticate {
        envelope,
        token: token.to_string(),
    })
}

fn command_frame<P: Serialize>(
    envelope: u16,
    command: &Command<'_, P>,
) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string(&("cmd", command))?;
    Ok(format!("{}{}", envelope, body))
}
