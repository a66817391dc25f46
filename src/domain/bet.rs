//! Bet entries embedded in round ticks.

use serde::{Deserialize, Serialize};

use crate::shared::serde_util::null_default;
use crate::shared::Scalar;

/// A single bet as listed in a tick's `bets` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    #[serde(default)]
    pub cashed_out_at: Option<f64>,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub amount: f64,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub currency_type: String,
    #[serde(default)]
    pub win_amount: Option<Scalar>,
    /// `"created"` while open, `"win"` once paid out.
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub status: String,
}

impl Bet {
    /// Whether the bet has been paid out.
    pub fn is_win(&self) -> bool {
        self.status == "win"
    }
}
