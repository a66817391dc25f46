//! Network constants for the Blaze live feed.

/// Replication endpoint for game rooms (crash, doubles).
pub const GAMES_WS_URL: &str = "wss://api-gaming.blaze.bet.br/replication/?EIO=3&transport=websocket";

/// Replication endpoint for the general channel (chat).
pub const GENERAL_WS_URL: &str = "wss://api-v2.blaze.bet.br/replication/?EIO=3&transport=websocket";

/// Host advertised by the browser client. Only sent when overridden.
pub const DEFAULT_HOST: &str = "api-v2.blaze1.space";

/// Origin sent with the upgrade request unless overridden.
pub const DEFAULT_ORIGIN: &str = "https://api-gaming.blaze.com";

/// User-Agent injected when the caller does not supply one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/102.0.0.0 Safari/537.36";

/// Headers a browser sends on the upgrade request.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Upgrade", "websocket"),
    (
        "Sec-Websocket-Extensions",
        "permessage-deflate; client_max_window_bits",
    ),
    ("Pragma", "no-cache"),
    ("Connection", "Upgrade"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("User-Agent", DEFAULT_USER_AGENT),
];

/// Resolve the endpoint for an address table key (`"games"` or `"general"`).
pub fn address_for(kind: &str) -> Option<&'static str> {
    match kind {
        "games" => Some(GAMES_WS_URL),
        "general" => Some(GENERAL_WS_URL),
        _ => None,
    }
}
