//! Raffle capture lifecycle: participants, winners and rounds.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::chat::{Badge, ChatMessage};
use crate::config::RaffleConfig;
use crate::participation::{self, Verdict};
use crate::selector;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaffleParticipant {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    /// The message that qualified the user.
    pub message: String,
    pub captured_at: DateTime<Utc>,
    pub is_winner: bool,
    /// Badges at qualification time; ticket weighting reads these.
    pub badges: Vec<Badge>,
}

impl RaffleParticipant {
    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            user_id: message.user_id.clone(),
            username: message.username.clone(),
            display_name: message.display_name.clone(),
            message: message.text.clone(),
            captured_at: message.received_at,
            is_winner: false,
            badges: message.badges.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RaffleStats {
    pub total_messages: u64,
    pub unique_participants: usize,
    pub capture_started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RafflePhase {
    Idle,
    Capturing,
    Rigged,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", content = "verdict", rename_all = "snake_case")]
pub enum IngestOutcome {
    Ignored(Verdict),
    Joined,
    /// Qualified, but the user already holds a participant record.
    AlreadyJoined,
}

impl IngestOutcome {
    pub fn is_participant(self) -> bool {
        matches!(self, IngestOutcome::Joined | IngestOutcome::AlreadyJoined)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrawResult {
    pub winner: RaffleParticipant,
    pub round: u32,
    pub total_participants: usize,
    pub eligible_participants: usize,
    pub total_tickets: usize,
    pub winner_tickets: usize,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RaffleError {
    #[error("capture is already running")]
    AlreadyCapturing,
    #[error("no eligible participants")]
    NoEligibleParticipants,
}

/// Raffle state. All mutation goes through the methods below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Raffle {
    is_capturing: bool,
    is_rigged: bool,
    round: u32,
    participants: Vec<RaffleParticipant>,
    winners: Vec<RaffleParticipant>,
    stats: RaffleStats,
}

impl Raffle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing
    }

    pub fn is_rigged(&self) -> bool {
        self.is_rigged
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn participants(&self) -> &[RaffleParticipant] {
        &self.participants
    }

    pub fn winners(&self) -> &[RaffleParticipant] {
        &self.winners
    }

    pub fn stats(&self) -> &RaffleStats {
        &self.stats
    }

    pub fn phase(&self) -> RafflePhase {
        if self.is_capturing {
            RafflePhase::Capturing
        } else if self.is_rigged {
            RafflePhase::Rigged
        } else {
            RafflePhase::Idle
        }
    }

    /// Begin a new capture session, discarding the previous one.
    pub fn start_capture(&mut self, now: DateTime<Utc>) -> Result<(), RaffleError> {
        if self.is_capturing {
            return Err(RaffleError::AlreadyCapturing);
        }
        self.participants.clear();
        self.winners.clear();
        self.round = 0;
        self.is_capturing = true;
        self.is_rigged = false;
        self.stats.unique_participants = 0;
        self.stats.capture_started_at = Some(now);
        tracing::info!(started_at = %now, "Raffle capture started");
        Ok(())
    }

    pub fn stop_capture(&mut self) {
        self.is_capturing = false;
        tracing::info!(participants = self.participants.len(), "Raffle capture stopped");
    }

    /// Stop capturing and mark the raffle ready to draw.
    pub fn rig(&mut self) {
        self.is_capturing = false;
        self.is_rigged = true;
        tracing::info!(participants = self.participants.len(), "Raffle rigged");
    }

    /// Evaluate an inbound message and register its sender when it qualifies.
    pub fn ingest(&mut self, message: &mut ChatMessage, config: &RaffleConfig) -> IngestOutcome {
        self.stats.total_messages += 1;

        let verdict = participation::evaluate(message, config, self.is_capturing, &self.winners);
        message.is_participant = verdict.is_participant();
        if !verdict.is_participant() {
            return IngestOutcome::Ignored(verdict);
        }

        if self.participants.iter().any(|p| p.user_id == message.user_id) {
            return IngestOutcome::AlreadyJoined;
        }

        self.participants.push(RaffleParticipant::from_message(message));
        self.stats.unique_participants = self.participants.len();
        tracing::debug!(
            user_id = %message.user_id,
            username = %message.username,
            participants = self.participants.len(),
            "Raffle participant joined"
        );
        IngestOutcome::Joined
    }

    /// Draw one winner with the operating system CSPRNG.
    pub fn execute_raffle(&mut self, config: &RaffleConfig) -> Result<DrawResult, RaffleError> {
        self.execute_raffle_with_rng(config, &mut OsRng)
    }

    /// Draw one winner. An empty eligible pool leaves the state untouched.
    pub fn execute_raffle_with_rng<R: Rng + ?Sized>(
        &mut self,
        config: &RaffleConfig,
        rng: &mut R,
    ) -> Result<DrawResult, RaffleError> {
        let (winner_id, eligible_participants, total_tickets) = {
            let pool = selector::build_ticket_pool(&self.participants, config);
            let eligible = selector::eligible_participants(&self.participants, config).len();
            let Some(winner) = selector::draw_with_rng(&pool, rng) else {
                tracing::warn!(
                    participants = self.participants.len(),
                    "Raffle draw skipped: no eligible participants"
                );
                return Err(RaffleError::NoEligibleParticipants);
            };
            (winner.user_id.clone(), eligible, pool.len())
        };

        let Some(winner) = self
            .participants
            .iter_mut()
            .find(|p| p.user_id == winner_id)
        else {
            return Err(RaffleError::NoEligibleParticipants);
        };
        winner.is_winner = true;
        let winner = winner.clone();
        let winner_tickets = selector::tickets_for(&winner, config);

        self.winners.push(winner.clone());
        self.round += 1;
        tracing::info!(
            round = self.round,
            user_id = %winner.user_id,
            username = %winner.username,
            total_tickets,
            winner_tickets,
            "Raffle winner drawn"
        );

        Ok(DrawResult {
            winner,
            round: self.round,
            total_participants: self.participants.len(),
            eligible_participants,
            total_tickets,
            winner_tickets,
        })
    }

    /// Empty the participant list; flags and winners are kept.
    pub fn clear_participants(&mut self) {
        self.participants.clear();
        self.stats.unique_participants = 0;
    }

    /// Back to idle with no participants, winners or rounds.
    pub fn reset(&mut self) {
        self.is_capturing = false;
        self.is_rigged = false;
        self.round = 0;
        self.participants.clear();
        self.winners.clear();
        self.stats.unique_participants = 0;
        self.stats.capture_started_at = None;
        tracing::info!("Raffle reset");
    }
}

#[cfg(test)]
#[path = "raffle_tests.rs"]
mod tests;
