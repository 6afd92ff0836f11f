//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_NUMERIC_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{1,20}$").unwrap());
static RE_WS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^wss?://[^\s/]+(/\S*)?$").unwrap());

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "TWITCH_USER_ID" | "TARGET_CHANNEL_ID" => {
            if !value.is_empty() && !RE_NUMERIC_ID.is_match(value) {
                return Err("must be a numeric Twitch user id".into());
            }
        }
        "CLIENT_ID" | "ACCESS_TOKEN" => {
            if value.chars().any(char::is_whitespace) {
                return Err("must not contain whitespace".into());
            }
        }
        "SERVER_PORT" => validate_int_range(value, 1, 65535)?,
        "EVENTSUB_URL" => {
            if !RE_WS_URL.is_match(value) {
                return Err("must be a ws:// or wss:// URL".into());
            }
        }
        "RECONNECT_BASE_DELAY_MS" => validate_int_range(value, 100, 60_000)?,
        "RECONNECT_MAX_ATTEMPTS" => validate_int_range(value, 0, 20)?,
        "CHAT_HISTORY_CAPACITY" => validate_int_range(value, 1, 1000)?,
        "AUTO_CONNECT" => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids() {
        assert!(validate_setting("TWITCH_USER_ID", "123456").is_ok());
        assert!(validate_setting("TARGET_CHANNEL_ID", "").is_ok());
        assert!(validate_setting("TARGET_CHANNEL_ID", "some_login").is_err());
    }

    #[test]
    fn test_int_ranges() {
        assert!(validate_setting("SERVER_PORT", "8090").is_ok());
        assert!(validate_setting("SERVER_PORT", "0").is_err());
        assert!(validate_setting("SERVER_PORT", "abc").is_err());
        assert!(validate_setting("RECONNECT_MAX_ATTEMPTS", "0").is_ok());
        assert!(validate_setting("CHAT_HISTORY_CAPACITY", "0").is_err());
    }

    #[test]
    fn test_eventsub_url() {
        assert!(validate_setting("EVENTSUB_URL", "wss://eventsub.wss.twitch.tv/ws").is_ok());
        assert!(validate_setting("EVENTSUB_URL", "ws://127.0.0.1:8080/ws").is_ok());
        assert!(validate_setting("EVENTSUB_URL", "https://example.com").is_err());
    }

    #[test]
    fn test_boolean() {
        assert!(validate_setting("AUTO_CONNECT", "false").is_ok());
        assert!(validate_setting("AUTO_CONNECT", "yes").is_err());
    }
}
