//! Database schema definitions and migrations.

use rusqlite::Connection;

use crate::DbError;

pub fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(SCHEMA)?;
    migrate_raffle_settings_base_tickets(conn)?;
    Ok(())
}

/// raffle_settings: databases created before the base ticket value existed
/// lack the column.
fn migrate_raffle_settings_base_tickets(conn: &Connection) -> Result<(), DbError> {
    if column_exists(conn, "raffle_settings", "base_ticket_value")? {
        return Ok(());
    }
    tracing::info!("Adding base_ticket_value column to raffle_settings");
    conn.execute_batch(
        "ALTER TABLE raffle_settings ADD COLUMN base_ticket_value INTEGER NOT NULL DEFAULT 1;",
    )?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DbError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .any(|name| name.as_deref() == Ok(column));
    Ok(exists)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    setting_type TEXT NOT NULL DEFAULT 'normal',
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS raffle_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    advanced BOOLEAN NOT NULL DEFAULT false,
    case_sensitive BOOLEAN NOT NULL DEFAULT false,
    ignore_mods BOOLEAN NOT NULL DEFAULT false,
    ignore_subs BOOLEAN NOT NULL DEFAULT false,
    ignore_vips BOOLEAN NOT NULL DEFAULT false,
    subs_extra_tickets BOOLEAN NOT NULL DEFAULT false,
    subs_extra_value INTEGER NOT NULL DEFAULT 1,
    vips_extra_tickets BOOLEAN NOT NULL DEFAULT false,
    vips_extra_value INTEGER NOT NULL DEFAULT 1,
    remove_winners BOOLEAN NOT NULL DEFAULT true,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS raffle_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    round INTEGER NOT NULL,
    winner_user_id TEXT NOT NULL,
    winner_username TEXT NOT NULL,
    winner_display_name TEXT NOT NULL DEFAULT '',
    winner_message TEXT NOT NULL DEFAULT '',
    total_participants INTEGER NOT NULL DEFAULT 0,
    eligible_participants INTEGER NOT NULL DEFAULT 0,
    total_tickets INTEGER NOT NULL DEFAULT 0,
    winner_tickets INTEGER NOT NULL DEFAULT 0,
    drawn_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_raffle_history_drawn_at ON raffle_history(drawn_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_missing_base_ticket_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE raffle_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                advanced BOOLEAN NOT NULL DEFAULT false,
                case_sensitive BOOLEAN NOT NULL DEFAULT false,
                ignore_mods BOOLEAN NOT NULL DEFAULT false,
                ignore_subs BOOLEAN NOT NULL DEFAULT false,
                ignore_vips BOOLEAN NOT NULL DEFAULT false,
                subs_extra_tickets BOOLEAN NOT NULL DEFAULT false,
                subs_extra_value INTEGER NOT NULL DEFAULT 1,
                vips_extra_tickets BOOLEAN NOT NULL DEFAULT false,
                vips_extra_value INTEGER NOT NULL DEFAULT 1,
                remove_winners BOOLEAN NOT NULL DEFAULT true,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO raffle_settings (id, advanced) VALUES (1, true);",
        )
        .unwrap();
        assert!(!column_exists(&conn, "raffle_settings", "base_ticket_value").unwrap());

        run_migrations(&conn).unwrap();
        assert!(column_exists(&conn, "raffle_settings", "base_ticket_value").unwrap());
        let base: i64 = conn
            .query_row(
                "SELECT base_ticket_value FROM raffle_settings WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(base, 1);
    }
}
