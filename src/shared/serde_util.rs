//! Custom serde helpers for the feed's wire formats.

/// Treats an explicit `null` as the type's default.
///
/// Ticks sometimes send `"bets": null` or `"total_bets_placed": null`
/// instead of omitting the field.
pub mod null_default {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Parses an RFC 3339 timestamp string as sent in `created_at` / `updated_at`.
pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}
