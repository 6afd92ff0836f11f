//! Winner history, one row per executed draw.

use chrono::{DateTime, SecondsFormat, Utc};
use raffle_core::DrawResult;
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaffleHistory {
    pub id: Option<i64>,
    pub round: u32,
    pub winner_user_id: String,
    pub winner_username: String,
    pub winner_display_name: String,
    pub winner_message: String,
    pub total_participants: u32,
    pub eligible_participants: u32,
    pub total_tickets: u32,
    pub winner_tickets: u32,
    pub drawn_at: DateTime<Utc>,
}

impl RaffleHistory {
    pub fn from_draw(draw: &DrawResult, drawn_at: DateTime<Utc>) -> Self {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        Self {
            id: None,
            round: draw.round,
            winner_user_id: draw.winner.user_id.clone(),
            winner_username: draw.winner.username.clone(),
            winner_display_name: draw.winner.display_name.clone(),
            winner_message: draw.winner.message.clone(),
            total_participants: count(draw.total_participants),
            eligible_participants: count(draw.eligible_participants),
            total_tickets: count(draw.total_tickets),
            winner_tickets: count(draw.winner_tickets),
            drawn_at,
        }
    }
}

// Fixed width so lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl Database {
    /// Insert a history row and return its id.
    pub fn save_raffle_history(&self, entry: &RaffleHistory) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO raffle_history (
                    round, winner_user_id, winner_username, winner_display_name, winner_message,
                    total_participants, eligible_participants, total_tickets, winner_tickets,
                    drawn_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    entry.round,
                    entry.winner_user_id,
                    entry.winner_username,
                    entry.winner_display_name,
                    entry.winner_message,
                    entry.total_participants,
                    entry.eligible_participants,
                    entry.total_tickets,
                    entry.winner_tickets,
                    format_timestamp(&entry.drawn_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Newest first. `limit == 0` returns everything.
    pub fn get_raffle_history(&self, limit: usize) -> Result<Vec<RaffleHistory>, DbError> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, round, winner_user_id, winner_username, winner_display_name,
                        winner_message, total_participants, eligible_participants,
                        total_tickets, winner_tickets, drawn_at
                 FROM raffle_history ORDER BY drawn_at DESC, id DESC",
            );
            if limit > 0 {
                sql.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| {
                Ok(RaffleHistory {
                    id: Some(row.get(0)?),
                    round: row.get(1)?,
                    winner_user_id: row.get(2)?,
                    winner_username: row.get(3)?,
                    winner_display_name: row.get(4)?,
                    winner_message: row.get(5)?,
                    total_participants: row.get(6)?,
                    eligible_participants: row.get(7)?,
                    total_tickets: row.get(8)?,
                    winner_tickets: row.get(9)?,
                    drawn_at: parse_timestamp(10, &row.get::<_, String>(10)?)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn delete_raffle_history(&self, id: i64) -> Result<(), DbError> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM raffle_history WHERE id = ?1", [id])?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("raffle history {id}")));
            }
            Ok(())
        })
    }

    /// Remove every history row; returns how many were deleted.
    pub fn clear_raffle_history(&self) -> Result<usize, DbError> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM raffle_history", [])?))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use raffle_core::RaffleParticipant;

    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000 + secs, 0).unwrap()
    }

    fn draw(round: u32, user: &str) -> DrawResult {
        DrawResult {
            winner: RaffleParticipant {
                user_id: format!("{user}-id"),
                username: user.into(),
                display_name: user.to_uppercase(),
                message: "!join".into(),
                captured_at: at(0),
                is_winner: true,
                badges: Vec::new(),
            },
            round,
            total_participants: 4,
            eligible_participants: 3,
            total_tickets: 5,
            winner_tickets: 2,
        }
    }

    #[test]
    fn from_draw_copies_winner_and_counts() {
        let entry = RaffleHistory::from_draw(&draw(2, "alice"), at(10));
        assert_eq!(entry.id, None);
        assert_eq!(entry.round, 2);
        assert_eq!(entry.winner_user_id, "alice-id");
        assert_eq!(entry.winner_display_name, "ALICE");
        assert_eq!(entry.winner_message, "!join");
        assert_eq!(entry.eligible_participants, 3);
        assert_eq!(entry.winner_tickets, 2);
    }

    #[test]
    fn save_and_list_newest_first() {
        let db = test_db();
        let first = db
            .save_raffle_history(&RaffleHistory::from_draw(&draw(1, "alice"), at(0)))
            .unwrap();
        let second = db
            .save_raffle_history(&RaffleHistory::from_draw(&draw(2, "bob"), at(60)))
            .unwrap();
        assert_ne!(first, second);

        let all = db.get_raffle_history(0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].winner_username, "bob");
        assert_eq!(all[0].id, Some(second));
        assert_eq!(all[0].drawn_at, at(60));
        assert_eq!(all[1].winner_username, "alice");

        let latest = db.get_raffle_history(1).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].round, 2);
    }

    #[test]
    fn same_timestamp_orders_by_id() {
        let db = test_db();
        db.save_raffle_history(&RaffleHistory::from_draw(&draw(1, "alice"), at(5)))
            .unwrap();
        db.save_raffle_history(&RaffleHistory::from_draw(&draw(2, "bob"), at(5)))
            .unwrap();
        let all = db.get_raffle_history(0).unwrap();
        assert_eq!(all[0].winner_username, "bob");
    }

    #[test]
    fn delete_and_clear() {
        let db = test_db();
        let id = db
            .save_raffle_history(&RaffleHistory::from_draw(&draw(1, "alice"), at(0)))
            .unwrap();
        db.save_raffle_history(&RaffleHistory::from_draw(&draw(2, "bob"), at(1)))
            .unwrap();

        db.delete_raffle_history(id).unwrap();
        assert!(matches!(
            db.delete_raffle_history(id),
            Err(DbError::NotFound(_))
        ));
        assert_eq!(db.get_raffle_history(0).unwrap().len(), 1);

        assert_eq!(db.clear_raffle_history().unwrap(), 1);
        assert!(db.get_raffle_history(0).unwrap().is_empty());
    }
}
