//! Runtime application configuration loaded from DB + environment overrides.

use std::time::Duration;

use raffle_core::chat::DEFAULT_CHAT_LOG_CAPACITY;
use twitch_client::Credentials;
use twitch_client::eventsub::{EVENTSUB_URL, RetryPolicy, SupervisorConfig};

use super::manager::SettingsManager;

const DEFAULT_SERVER_PORT: u16 = 8090;
const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 5;

/// Runtime configuration populated from the settings DB.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub access_token: String,
    pub twitch_user_id: String,
    pub target_channel_id: String,
    pub server_port: u16,
    pub eventsub_url: String,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_attempts: u32,
    pub chat_history_capacity: usize,
    pub auto_connect: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            access_token: String::new(),
            twitch_user_id: String::new(),
            target_channel_id: String::new(),
            server_port: DEFAULT_SERVER_PORT,
            eventsub_url: EVENTSUB_URL.into(),
            reconnect_base_delay_ms: DEFAULT_RECONNECT_BASE_DELAY_MS,
            reconnect_max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
            chat_history_capacity: DEFAULT_CHAT_LOG_CAPACITY,
            auto_connect: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the settings manager (DB-first, env overrides).
    pub fn load(sm: &SettingsManager) -> Result<Self, anyhow::Error> {
        let g = |key: &str| -> String { sm.get_setting(key).unwrap_or_default() };

        let mut server_port = parse_or(&g("SERVER_PORT"), DEFAULT_SERVER_PORT);
        if let Ok(v) = std::env::var("SERVER_PORT") {
            match v.parse::<u16>() {
                Ok(p) if p > 0 => server_port = p,
                _ => tracing::warn!("Ignoring invalid SERVER_PORT override: {v}"),
            }
        }

        Ok(Self {
            client_id: g("CLIENT_ID").trim().to_string(),
            access_token: g("ACCESS_TOKEN").trim().to_string(),
            twitch_user_id: g("TWITCH_USER_ID").trim().to_string(),
            target_channel_id: g("TARGET_CHANNEL_ID").trim().to_string(),
            server_port,
            eventsub_url: {
                let url = g("EVENTSUB_URL");
                if url.is_empty() { EVENTSUB_URL.into() } else { url }
            },
            reconnect_base_delay_ms: parse_or(
                &g("RECONNECT_BASE_DELAY_MS"),
                DEFAULT_RECONNECT_BASE_DELAY_MS,
            ),
            reconnect_max_attempts: parse_or(
                &g("RECONNECT_MAX_ATTEMPTS"),
                DEFAULT_RECONNECT_MAX_ATTEMPTS,
            ),
            chat_history_capacity: parse_or(&g("CHAT_HISTORY_CAPACITY"), DEFAULT_CHAT_LOG_CAPACITY)
                .max(1),
            auto_connect: g("AUTO_CONNECT") != "false",
        })
    }

    /// Reload config from the settings manager.
    pub fn reload(&mut self, sm: &SettingsManager) -> Result<(), anyhow::Error> {
        *self = Self::load(sm)?;
        Ok(())
    }

    /// `None` when nothing is configured; a partial set is passed on so the
    /// supervisor can report which field is missing.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.client_id.is_empty() && self.access_token.is_empty() && self.twitch_user_id.is_empty()
        {
            return None;
        }
        Some(Credentials {
            client_id: self.client_id.clone(),
            access_token: self.access_token.clone(),
            user_id: self.twitch_user_id.clone(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            url: self.eventsub_url.clone(),
            retry: self.retry_policy(),
            auto_connect: self.auto_connect,
            channel_id: (!self.target_channel_id.is_empty()).then(|| self.target_channel_id.clone()),
            credentials: self.credentials(),
            ..SupervisorConfig::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(s: &str, default: T) -> T {
    if s.is_empty() {
        return default;
    }
    s.parse().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use raffle_db::Database;

    use super::*;

    fn manager() -> SettingsManager {
        SettingsManager::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn defaults_from_empty_db() {
        let config = AppConfig::load(&manager()).unwrap();
        assert_eq!(config.eventsub_url, EVENTSUB_URL);
        assert_eq!(config.chat_history_capacity, 100);
        assert!(config.auto_connect);
        assert!(config.credentials().is_none());

        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.retry, RetryPolicy::default());
        assert_eq!(supervisor.channel_id, None);
        assert!(supervisor.credentials.is_none());
    }

    #[test]
    fn stored_settings_flow_into_supervisor_config() {
        let sm = manager();
        sm.set_setting("CLIENT_ID", "cid").unwrap();
        sm.set_setting("ACCESS_TOKEN", "tok").unwrap();
        sm.set_setting("TWITCH_USER_ID", "1001").unwrap();
        sm.set_setting("TARGET_CHANNEL_ID", "2002").unwrap();
        sm.set_setting("RECONNECT_BASE_DELAY_MS", "250").unwrap();
        sm.set_setting("RECONNECT_MAX_ATTEMPTS", "3").unwrap();
        sm.set_setting("AUTO_CONNECT", "false").unwrap();

        let config = AppConfig::load(&sm).unwrap();
        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.channel_id.as_deref(), Some("2002"));
        assert_eq!(supervisor.retry.base_delay, Duration::from_millis(250));
        assert_eq!(supervisor.retry.max_attempts, 3);
        assert!(!supervisor.auto_connect);
        assert_eq!(
            supervisor.credentials,
            Some(Credentials {
                client_id: "cid".into(),
                access_token: "tok".into(),
                user_id: "1001".into(),
            })
        );
    }

    #[test]
    fn partial_credentials_are_kept() {
        let sm = manager();
        sm.set_setting("CLIENT_ID", "cid").unwrap();
        let config = AppConfig::load(&sm).unwrap();
        let credentials = config.credentials().unwrap();
        assert!(credentials.validate().is_err());
    }
}
