//! Typed payloads carried by the feed's data frames.
//!
//! Every struct here is decoded from the `payload` field of a data frame.
//! Decoding is tolerant: missing non-key fields fall back to defaults so a
//! server-side schema addition never turns a known event into an unrecognized one.

pub mod bet;
pub mod chat;
pub mod crash;
pub mod double;

pub use bet::Bet;
pub use chat::{ChatMessage, ChatUser};
pub use crash::{CrashTick, CrashTickBets};
pub use double::{DoubleColor, DoubleTick};

/// Lifecycle of a game round as reported in a tick's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundStatus {
    Waiting,
    Graphing,
    Rolling,
    Complete,
    Other,
}

impl From<&str> for RoundStatus {
    fn from(s: &str) -> Self {
        match s {
            "waiting" => Self::Waiting,
            "graphing" => Self::Graphing,
            "rolling" => Self::Rolling,
            "complete" => Self::Complete,
            _ => Self::Other,
        }
    }
}

impl RoundStatus {
    /// Whether the round has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}
