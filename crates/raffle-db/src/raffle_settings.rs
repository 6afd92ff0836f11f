//! Persisted raffle configuration (single row, id = 1).
//!
//! The keyword is per-session and never written to disk; a loaded config
//! always starts with an empty keyword.

use raffle_core::RaffleConfig;
use rusqlite::OptionalExtension;

use crate::{Database, DbError};

impl Database {
    /// Load the stored config, or defaults when nothing valid has been saved.
    pub fn get_raffle_config(&self) -> Result<RaffleConfig, DbError> {
        self.with_conn(|conn| {
            let stored = conn
                .query_row(
                    "SELECT advanced, case_sensitive, ignore_mods, ignore_subs, ignore_vips,
                            subs_extra_tickets, subs_extra_value, vips_extra_tickets,
                            vips_extra_value, remove_winners, base_ticket_value
                     FROM raffle_settings WHERE id = 1",
                    [],
                    |row| {
                        Ok(RaffleConfig {
                            keyword: String::new(),
                            advanced: row.get(0)?,
                            case_sensitive: row.get(1)?,
                            ignore_mods: row.get(2)?,
                            ignore_subs: row.get(3)?,
                            ignore_vips: row.get(4)?,
                            subs_extra_tickets: row.get(5)?,
                            subs_extra_value: row.get(6)?,
                            vips_extra_tickets: row.get(7)?,
                            vips_extra_value: row.get(8)?,
                            remove_winners: row.get(9)?,
                            base_ticket_value: row.get(10)?,
                        })
                    },
                )
                .optional()?;
            match stored {
                Some(config) if config.validate().is_err() => {
                    tracing::warn!(?config, "Stored raffle config is out of range, using defaults");
                    Ok(RaffleConfig::default())
                }
                stored => Ok(stored.unwrap_or_default()),
            }
        })
    }

    pub fn save_raffle_config(&self, config: &RaffleConfig) -> Result<(), DbError> {
        config
            .validate()
            .map_err(|e| DbError::InvalidData(e.to_string()))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO raffle_settings (
                    id, advanced, case_sensitive, ignore_mods, ignore_subs, ignore_vips,
                    subs_extra_tickets, subs_extra_value, vips_extra_tickets, vips_extra_value,
                    remove_winners, base_ticket_value, updated_at
                 ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, CURRENT_TIMESTAMP)
                 ON CONFLICT(id) DO UPDATE SET
                    advanced = excluded.advanced,
                    case_sensitive = excluded.case_sensitive,
                    ignore_mods = excluded.ignore_mods,
                    ignore_subs = excluded.ignore_subs,
                    ignore_vips = excluded.ignore_vips,
                    subs_extra_tickets = excluded.subs_extra_tickets,
                    subs_extra_value = excluded.subs_extra_value,
                    vips_extra_tickets = excluded.vips_extra_tickets,
                    vips_extra_value = excluded.vips_extra_value,
                    remove_winners = excluded.remove_winners,
                    base_ticket_value = excluded.base_ticket_value,
                    updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![
                    config.advanced,
                    config.case_sensitive,
                    config.ignore_mods,
                    config.ignore_subs,
                    config.ignore_vips,
                    config.subs_extra_tickets,
                    config.subs_extra_value,
                    config.vips_extra_tickets,
                    config.vips_extra_value,
                    config.remove_winners,
                    config.base_ticket_value,
                ],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn defaults_when_unsaved() {
        let db = test_db();
        assert_eq!(db.get_raffle_config().unwrap(), RaffleConfig::default());
    }

    #[test]
    fn save_and_reload_drops_keyword() {
        let db = test_db();
        let config = RaffleConfig {
            keyword: "!join".into(),
            advanced: true,
            case_sensitive: true,
            ignore_mods: true,
            subs_extra_tickets: true,
            subs_extra_value: 3,
            vips_extra_tickets: true,
            vips_extra_value: 2,
            remove_winners: false,
            base_ticket_value: 2,
            ..RaffleConfig::default()
        };
        db.save_raffle_config(&config).unwrap();

        let loaded = db.get_raffle_config().unwrap();
        assert_eq!(loaded.keyword, "");
        assert_eq!(loaded, config.without_keyword());
    }

    #[test]
    fn save_overwrites_single_row() {
        let db = test_db();
        db.save_raffle_config(&RaffleConfig {
            advanced: true,
            ..RaffleConfig::default()
        })
        .unwrap();
        db.save_raffle_config(&RaffleConfig::default()).unwrap();

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM raffle_settings", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
        assert!(!db.get_raffle_config().unwrap().advanced);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let db = test_db();
        let config = RaffleConfig {
            base_ticket_value: 0,
            ..RaffleConfig::default()
        };
        assert!(matches!(
            db.save_raffle_config(&config),
            Err(DbError::InvalidData(_))
        ));
        assert_eq!(db.get_raffle_config().unwrap(), RaffleConfig::default());
    }

    #[test]
    fn out_of_range_row_loads_as_defaults() {
        let db = test_db();
        db.save_raffle_config(&RaffleConfig::default()).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE raffle_settings SET subs_extra_tickets = 1, subs_extra_value = ?1",
                [raffle_core::config::MAX_TICKET_VALUE + 1],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.get_raffle_config().unwrap(), RaffleConfig::default());
    }
}
