//! SettingsManager: DB-backed settings with defaults, migration, and feature status.

use std::collections::HashMap;

use raffle_db::Database;

use super::defaults::{DEFAULT_SETTINGS, SettingDef, required_keys};
use super::validation::validate_setting;
use super::{FeatureStatus, SettingInfo, SettingType};

const SECRET_MASK: &str = "********";

/// Wraps [`Database`] to provide high-level settings operations.
pub struct SettingsManager {
    db: Database,
}

fn setting_type(def: &SettingDef) -> SettingType {
    if def.secret {
        SettingType::Secret
    } else {
        SettingType::Normal
    }
}

impl SettingsManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a setting value. Falls back to default if not in DB.
    pub fn get_setting(&self, key: &str) -> Result<String, anyhow::Error> {
        if let Some(val) = self.db.get_setting(key)? {
            return Ok(val);
        }
        if let Some(def) = DEFAULT_SETTINGS.get(key) {
            return Ok(def.default.to_string());
        }
        anyhow::bail!("setting not found: {key}");
    }

    /// Set a setting value with validation.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), anyhow::Error> {
        let def = DEFAULT_SETTINGS
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;

        validate_setting(key, value)
            .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;

        self.db.set_setting(key, value, setting_type(def).as_str())?;
        Ok(())
    }

    /// Validate every entry first, then write them in one transaction.
    pub fn set_settings(&self, settings: &HashMap<String, String>) -> Result<usize, anyhow::Error> {
        let mut rows = Vec::with_capacity(settings.len());
        for (key, value) in settings {
            let def = DEFAULT_SETTINGS
                .get(key.as_str())
                .ok_or_else(|| anyhow::anyhow!("unknown setting key: {key}"))?;
            validate_setting(key, value)
                .map_err(|e| anyhow::anyhow!("validation error for {key}: {e}"))?;
            rows.push((key.as_str(), value.as_str(), setting_type(def).as_str()));
        }
        self.db.set_settings_bulk(&rows)?;
        Ok(rows.len())
    }

    /// All known settings with defaults filled in. Secret values are masked.
    pub fn get_all_settings(&self) -> Result<HashMap<String, SettingInfo>, anyhow::Error> {
        let stored = self.db.get_all_settings()?;
        let result = DEFAULT_SETTINGS
            .iter()
            .map(|(key, def)| {
                let value = stored
                    .get(*key)
                    .cloned()
                    .unwrap_or_else(|| def.default.to_string());
                let has_value = !value.is_empty();
                let value = if def.secret && has_value {
                    SECRET_MASK.to_string()
                } else {
                    value
                };
                (
                    key.to_string(),
                    SettingInfo {
                        key: key.to_string(),
                        value,
                        setting_type: setting_type(def),
                        required: def.required,
                        description: def.description.to_string(),
                        has_value,
                    },
                )
            })
            .collect();
        Ok(result)
    }

    /// Initialize default settings in DB (skip existing).
    pub fn initialize_defaults(&self) -> Result<(), anyhow::Error> {
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            self.db
                .set_setting(key, def.default, setting_type(def).as_str())?;
        }
        Ok(())
    }

    /// Copy settings from environment variables into the DB for keys that are
    /// not stored yet.
    pub fn migrate_from_env(&self) -> Result<u32, anyhow::Error> {
        let mut migrated = 0u32;
        for (key, def) in DEFAULT_SETTINGS.iter() {
            if self.db.get_setting(key)?.is_some() {
                continue;
            }
            let Ok(env_val) = std::env::var(key) else {
                continue;
            };
            if env_val.is_empty() {
                continue;
            }
            if let Err(e) = validate_setting(key, &env_val) {
                tracing::warn!("Ignoring invalid {key} from env: {e}");
                continue;
            }
            self.db
                .set_setting(key, &env_val, setting_type(def).as_str())?;
            tracing::info!("Migrated setting from env: {key}");
            migrated += 1;
        }
        if migrated > 0 {
            tracing::info!("Migration completed: {migrated} settings migrated");
            if has_secret_in_env() {
                tracing::warn!(
                    "SECURITY WARNING: Sensitive data in env vars. \
                     Remove from .env after confirming migration."
                );
            }
        }
        Ok(migrated)
    }

    pub fn check_feature_status(&self) -> Result<FeatureStatus, anyhow::Error> {
        let mut status = FeatureStatus {
            twitch_configured: true,
            missing_settings: Vec::new(),
            warnings: Vec::new(),
        };

        for key in required_keys() {
            if self.get_setting(key)?.trim().is_empty() {
                status.missing_settings.push(key.to_string());
                status.twitch_configured = false;
            }
        }
        status.missing_settings.sort();

        if self.get_setting("AUTO_CONNECT")? == "false" {
            status
                .warnings
                .push("AUTO_CONNECT is disabled - connect manually to read chat".into());
        }
        if self.get_setting("TARGET_CHANNEL_ID")?.is_empty() {
            status
                .warnings
                .push("TARGET_CHANNEL_ID is empty - reading the authenticated user's channel".into());
        }

        Ok(status)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}

fn has_secret_in_env() -> bool {
    DEFAULT_SETTINGS
        .values()
        .filter(|def| def.secret)
        .any(|def| std::env::var(def.key).is_ok_and(|v| !v.is_empty()))
}
