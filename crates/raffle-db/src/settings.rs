//! Key-value store behind the application settings manager.

use std::collections::HashMap;

use rusqlite::OptionalExtension;

use crate::{Database, DbError};

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>, DbError> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    /// Upsert a setting. `setting_type` is `"normal"` or `"secret"`.
    pub fn set_setting(&self, key: &str, value: &str, setting_type: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value, setting_type, updated_at) VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, setting_type = ?3, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, value, setting_type],
            )?;
            Ok(())
        })
    }

    /// Write several settings in one transaction, keeping each key's type.
    pub fn set_settings_bulk(&self, settings: &[(&str, &str, &str)]) -> Result<(), DbError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO settings (key, value, setting_type, updated_at) VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
                     ON CONFLICT(key) DO UPDATE SET value = ?2, setting_type = ?3, updated_at = CURRENT_TIMESTAMP",
                )?;
                for (key, value, setting_type) in settings {
                    stmt.execute(rusqlite::params![key, value, setting_type])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_all_settings(&self) -> Result<HashMap<String, String>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<HashMap<_, _>, _>>()
                .map_err(DbError::from)
        })
    }

    pub fn delete_setting(&self, key: &str) -> Result<(), DbError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
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
    fn missing_setting_is_none() {
        let db = test_db();
        assert_eq!(db.get_setting("CLIENT_ID").unwrap(), None);
    }

    #[test]
    fn set_overwrites_value_and_type() {
        let db = test_db();
        db.set_setting("ACCESS_TOKEN", "abc", "normal").unwrap();
        db.set_setting("ACCESS_TOKEN", "xyz", "secret").unwrap();
        assert_eq!(db.get_setting("ACCESS_TOKEN").unwrap(), Some("xyz".into()));

        let setting_type: String = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT setting_type FROM settings WHERE key = 'ACCESS_TOKEN'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(setting_type, "secret");
    }

    #[test]
    fn bulk_write_and_delete() {
        let db = test_db();
        db.set_settings_bulk(&[
            ("SERVER_PORT", "8090", "normal"),
            ("CLIENT_ID", "cid", "secret"),
        ])
        .unwrap();

        let all = db.get_all_settings().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["SERVER_PORT"], "8090");

        db.delete_setting("CLIENT_ID").unwrap();
        assert_eq!(db.get_setting("CLIENT_ID").unwrap(), None);
        assert_eq!(db.get_all_settings().unwrap().len(), 1);
    }
}
