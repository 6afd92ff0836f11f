//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

use twitch_client::eventsub::EVENTSUB_URL;

type DefTuple = (&'static str, &'static str, bool, bool, &'static str);

const DEFS: &[DefTuple] = &[
    ("CLIENT_ID", "", true, true, "Twitch application client id"),
    ("ACCESS_TOKEN", "", true, true, "User access token with the user:read:chat scope"),
    ("TWITCH_USER_ID", "", false, true, "Id of the user the access token belongs to"),
    ("TARGET_CHANNEL_ID", "", false, false, "Channel to read; defaults to TWITCH_USER_ID"),
    ("SERVER_PORT", "8090", false, false, "Control API port"),
    ("EVENTSUB_URL", EVENTSUB_URL, false, false, "EventSub WebSocket endpoint"),
    ("RECONNECT_BASE_DELAY_MS", "1000", false, false, "First retry delay; doubles per attempt"),
    ("RECONNECT_MAX_ATTEMPTS", "5", false, false, "Retries before giving up"),
    ("CHAT_HISTORY_CAPACITY", "100", false, false, "Chat messages kept in memory"),
    ("AUTO_CONNECT", "true", false, false, "Connect to chat on startup"),
];

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub secret: bool,
    pub required: bool,
    pub description: &'static str,
}

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, secret, required, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    secret,
                    required,
                    description,
                },
            )
        })
        .collect()
});

/// Keys that must be set before chat can be read.
pub fn required_keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter()
        .filter(|(_, _, _, required, _)| *required)
        .map(|(key, ..)| *key)
}
