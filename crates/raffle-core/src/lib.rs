//! Raffle engine: chat message model, participation rules, capture lifecycle
//! and weighted winner selection.
//!
//! Everything in this crate is synchronous and free of I/O. Callers own the
//! [`raffle::Raffle`] value and drive it with chat messages and user actions.

pub mod chat;
pub mod config;
pub mod participation;
pub mod raffle;
pub mod selector;

pub use chat::{Badge, ChatLog, ChatMessage, Cheer, MessageKind};
pub use config::{ConfigError, RaffleConfig, RaffleConfigUpdate};
pub use participation::{ParticipationPolicy, Role, Verdict};
pub use raffle::{
    DrawResult, IngestOutcome, Raffle, RaffleError, RaffleParticipant, RafflePhase, RaffleStats,
};
