//! Chat payloads (`chat.message`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::serde_util::{null_default, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub username: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub rank: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub level: i64,
}

/// A message posted to the public chat room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub text: String,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub available: bool,
    #[serde(default, deserialize_with = "null_default::deserialize")]
    pub created_at: String,
    pub user: ChatUser,
}

impl ChatMessage {
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}
