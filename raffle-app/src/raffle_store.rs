//! Owned raffle state for the app: the raffle itself, its configuration and
//! the recent chat log, behind one lock.
//!
//! Every action takes the lock for a synchronous critical section, then
//! broadcasts the resulting state to WebSocket clients after releasing it.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use raffle_core::{
    ChatLog, ChatMessage, ConfigError, DrawResult, IngestOutcome, Raffle, RaffleConfig,
    RaffleConfigUpdate, RaffleError, RaffleParticipant, RafflePhase, RaffleStats,
};
use raffle_db::{Database, DbError, RaffleHistory};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::events;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Raffle(#[from] RaffleError),

    #[error("invalid raffle config: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Db(#[from] DbError),

    #[error("raffle state lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// HTTP status for the control API.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Raffle(_) => 409,
            StoreError::Config(_) => 400,
            StoreError::Db(_) | StoreError::LockPoisoned => 500,
        }
    }
}

/// Point-in-time copy of the raffle for API responses and broadcasts.
#[derive(Debug, Clone, Serialize)]
pub struct RaffleSnapshot {
    pub phase: RafflePhase,
    pub is_capturing: bool,
    pub is_rigged: bool,
    pub round: u32,
    pub participants: Vec<RaffleParticipant>,
    pub winners: Vec<RaffleParticipant>,
    pub stats: RaffleStats,
    pub config: RaffleConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct DrawOutcome {
    #[serde(flatten)]
    pub draw: DrawResult,
    /// Row id in the winner history; `None` if recording it failed.
    pub history_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
struct ParticipantJoined<'a> {
    participant: &'a RaffleParticipant,
    stats: &'a RaffleStats,
}

struct RaffleInner {
    raffle: Raffle,
    config: RaffleConfig,
    chat: ChatLog,
}

impl RaffleInner {
    fn snapshot(&self) -> RaffleSnapshot {
        RaffleSnapshot {
            phase: self.raffle.phase(),
            is_capturing: self.raffle.is_capturing(),
            is_rigged: self.raffle.is_rigged(),
            round: self.raffle.round(),
            participants: self.raffle.participants().to_vec(),
            winners: self.raffle.winners().to_vec(),
            stats: self.raffle.stats().clone(),
            config: self.config.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RaffleStore {
    inner: Arc<Mutex<RaffleInner>>,
    db: Database,
    events: broadcast::Sender<String>,
}

impl RaffleStore {
    /// Build the store with the persisted raffle config (keyword starts empty).
    pub fn new(
        db: Database,
        chat_capacity: usize,
        events: broadcast::Sender<String>,
    ) -> Result<Self, StoreError> {
        let config = db.get_raffle_config()?;
        Ok(Self {
            inner: Arc::new(Mutex::new(RaffleInner {
                raffle: Raffle::new(),
                config,
                chat: ChatLog::with_capacity(chat_capacity),
            })),
            db,
            events,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RaffleInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run `f` against the raffle, then broadcast the new state.
    fn mutate<F>(&self, f: F) -> Result<RaffleSnapshot, StoreError>
    where
        F: FnOnce(&mut Raffle) -> Result<(), RaffleError>,
    {
        let snapshot = {
            let mut inner = self.lock()?;
            f(&mut inner.raffle)?;
            inner.snapshot()
        };
        events::emit(&self.events, events::RAFFLE_STATE, &snapshot);
        Ok(snapshot)
    }

    pub fn snapshot(&self) -> Result<RaffleSnapshot, StoreError> {
        Ok(self.lock()?.snapshot())
    }

    pub fn start_capture(&self) -> Result<RaffleSnapshot, StoreError> {
        self.mutate(|raffle| raffle.start_capture(Utc::now()))
    }

    pub fn stop_capture(&self) -> Result<RaffleSnapshot, StoreError> {
        self.mutate(|raffle| {
            raffle.stop_capture();
            Ok(())
        })
    }

    pub fn rig(&self) -> Result<RaffleSnapshot, StoreError> {
        self.mutate(|raffle| {
            raffle.rig();
            Ok(())
        })
    }

    pub fn clear_participants(&self) -> Result<RaffleSnapshot, StoreError> {
        self.mutate(|raffle| {
            raffle.clear_participants();
            Ok(())
        })
    }

    pub fn reset(&self) -> Result<RaffleSnapshot, StoreError> {
        self.mutate(|raffle| {
            raffle.reset();
            Ok(())
        })
    }

    /// Draw one winner and record it in the history.
    pub fn execute(&self) -> Result<DrawOutcome, StoreError> {
        let (draw, snapshot) = {
            let mut inner = self.lock()?;
            let config = inner.config.clone();
            let draw = inner.raffle.execute_raffle(&config)?;
            (draw, inner.snapshot())
        };

        let history_id = match self
            .db
            .save_raffle_history(&RaffleHistory::from_draw(&draw, Utc::now()))
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Failed to record raffle winner: {e}");
                None
            }
        };
        let outcome = DrawOutcome { draw, history_id };
        events::emit(&self.events, events::RAFFLE_WINNER, &outcome);
        events::emit(&self.events, events::RAFFLE_STATE, &snapshot);
        Ok(outcome)
    }

    pub fn config(&self) -> Result<RaffleConfig, StoreError> {
        Ok(self.lock()?.config.clone())
    }

    /// Apply a partial update. Nothing changes, in memory or on disk, when the
    /// merged config is invalid.
    pub fn update_config(&self, update: RaffleConfigUpdate) -> Result<RaffleConfig, StoreError> {
        let config = {
            let mut inner = self.lock()?;
            let mut next = inner.config.clone();
            next.apply(update)?;
            self.db.save_raffle_config(&next.without_keyword())?;
            inner.config = next.clone();
            next
        };
        events::emit(&self.events, events::RAFFLE_CONFIG, &config);
        Ok(config)
    }

    /// Evaluate a chat message, keep it in the chat log and broadcast it.
    pub fn ingest(&self, mut message: ChatMessage) -> Result<IngestOutcome, StoreError> {
        let (outcome, joined) = {
            let mut inner = self.lock()?;
            let RaffleInner {
                raffle,
                config,
                chat,
            } = &mut *inner;
            let outcome = raffle.ingest(&mut message, config);
            chat.push(message.clone());
            let joined = (outcome == IngestOutcome::Joined).then(|| {
                raffle
                    .participants()
                    .last()
                    .cloned()
                    .map(|participant| (participant, raffle.stats().clone()))
            });
            (outcome, joined.flatten())
        };

        events::emit(&self.events, events::CHAT_MESSAGE, &message);
        if let Some((participant, stats)) = joined {
            events::emit(
                &self.events,
                events::RAFFLE_PARTICIPANT_JOINED,
                &ParticipantJoined {
                    participant: &participant,
                    stats: &stats,
                },
            );
        }
        Ok(outcome)
    }

    /// The newest `limit` chat messages, oldest first.
    pub fn recent_chat(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self.lock()?.chat.recent(limit))
    }

    pub fn chat_capacity(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.chat.capacity())
    }

    pub fn history(&self, limit: usize) -> Result<Vec<RaffleHistory>, StoreError> {
        Ok(self.db.get_raffle_history(limit)?)
    }

    pub fn delete_history(&self, id: i64) -> Result<(), StoreError> {
        Ok(self.db.delete_raffle_history(id)?)
    }

    pub fn clear_history(&self) -> Result<usize, StoreError> {
        Ok(self.db.clear_raffle_history()?)
    }
}

#[cfg(test)]
#[path = "raffle_store_tests.rs"]
mod tests;
