//! Crash game payloads (`crash.tick`, `crash.tick-bets`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bet, RoundStatus};
use crate::shared::serde_util::{null_default, parse_timestamp};
use crate::shared::Scalar;

/// Round state update for the crash game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashTick {
    pub id: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub updated_at: String,
    pub status: String,
    /// Multiplier the round crashed at. Absent until the round completes.
    #[serde(default)]
    pub crash_point: Option<Scalar>,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub is_bonus_round: bool,
}

impl CrashTick {
    pub fn round_status(&self) -> RoundStatus {
        RoundStatus::from(self.status.as_str())
    }

    pub fn crash_point(&self) -> Option<f64> {
        self.crash_point.as_ref().and_then(Scalar::as_f64)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }
}

/// Aggregated bet totals for a crash round. Only sent on some rooms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashTickBets {
    pub id: String,
    #[serde(rename = "roomId", default, deserialize_with = "null_default::deserialize")]
    pub room_id: i64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_eur_bet: f64,
    #[serde(default)]
    pub total_bets_placed: Option<Scalar>,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_eur_won: f64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub bets: Vec<Bet>,
}
