//! Double (roulette) game payloads (`double.tick`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bet, RoundStatus};
use crate::shared::serde_util::{null_default, parse_timestamp};
use crate::shared::Scalar;

/// Winning color of a double round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleColor {
    White,
    Red,
    Black,
}

impl DoubleColor {
    /// Map the wire code (`0`, `1`, `2`) to a color.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::White),
            1 => Some(Self::Red),
            2 => Some(Self::Black),
            _ => None,
        }
    }
}

/// Round state update for the double game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleTick {
    pub id: String,
    #[serde(default)]
    pub color: Option<Scalar>,
    #[serde(default)]
    pub roll: Option<Scalar>,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub updated_at: String,
    /// `"waiting"`, `"rolling"` or `"complete"`.
    pub status: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_red_eur_bet: f64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_red_bets_placed: i64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_white_eur_bet: f64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_white_bets_placed: i64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_black_eur_bet: f64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub total_black_bets_placed: i64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub bets: Vec<Bet>,
}

impl DoubleTick {
    pub fn round_status(&self) -> RoundStatus {
        RoundStatus::from(self.status.as_str())
    }

    /// Winning color, once the server has revealed it.
    pub fn color(&self) -> Option<DoubleColor> {
        let code = self.color.as_ref()?.as_f64()?;
        DoubleColor::from_code(code as i64)
    }

    /// Rolled number (0–14), once revealed.
    pub fn roll(&self) -> Option<u8> {
        let roll = self.roll.as_ref()?.as_f64()?;
        (0.0..=14.0).contains(&roll).then_some(roll as u8)
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }
}
