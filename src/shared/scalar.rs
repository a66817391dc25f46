//! String-or-number wire fields.
//!
//! The feed is inconsistent about a handful of fields (`crash_point`, `roll`,
//! `color`): the same field arrives as `1.53` on one tick and `"1.53"` on the
//! next. [`Scalar`] accepts either and normalizes on read.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A JSON scalar that may be encoded as a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Numeric value. An empty string reads as `0`; non-numeric text is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse().ok()
                }
            }
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(Self::Number)
            .unwrap_or_else(|| Self::Text(value.to_string()))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
