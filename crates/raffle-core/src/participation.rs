//! Participation rules: decides whether a chat message enters its sender
//! into the raffle.

use serde::{Deserialize, Serialize};

use crate::chat::{BADGE_MODERATOR, BADGE_SUBSCRIBER, BADGE_VIP, ChatMessage};
use crate::config::RaffleConfig;
use crate::raffle::RaffleParticipant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Moderator,
    Subscriber,
    Vip,
}

impl Role {
    pub fn badge(self) -> &'static str {
        match self {
            Role::Moderator => BADGE_MODERATOR,
            Role::Subscriber => BADGE_SUBSCRIBER,
            Role::Vip => BADGE_VIP,
        }
    }
}

/// Outcome of evaluating one message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", content = "role", rename_all = "snake_case")]
pub enum Verdict {
    NotCapturing,
    KeywordMismatch,
    PreviousWinner,
    IgnoredRole(Role),
    Qualified,
}

impl Verdict {
    pub fn is_participant(self) -> bool {
        matches!(self, Verdict::Qualified)
    }
}

/// Matching rules derived from a [`RaffleConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipationPolicy {
    /// Case-insensitive keyword match, no role filtering.
    Simple { keyword: String },
    Advanced {
        keyword: String,
        case_sensitive: bool,
        remove_winners: bool,
        ignored_roles: Vec<Role>,
    },
}

impl ParticipationPolicy {
    pub fn from_config(config: &RaffleConfig) -> Self {
        if !config.advanced {
            return Self::Simple {
                keyword: config.keyword.to_lowercase(),
            };
        }

        let ignored_roles = [
            (config.ignore_mods, Role::Moderator),
            (config.ignore_subs, Role::Subscriber),
            (config.ignore_vips, Role::Vip),
        ]
        .into_iter()
        .filter_map(|(ignored, role)| ignored.then_some(role))
        .collect();

        Self::Advanced {
            keyword: config.keyword.clone(),
            case_sensitive: config.case_sensitive,
            remove_winners: config.remove_winners,
            ignored_roles,
        }
    }

    /// Evaluate a message sent while capture is active.
    pub fn evaluate(&self, message: &ChatMessage, winners: &[RaffleParticipant]) -> Verdict {
        let text = message.text.trim();
        match self {
            Self::Simple { keyword } => {
                if text.to_lowercase() == *keyword {
                    Verdict::Qualified
                } else {
                    Verdict::KeywordMismatch
                }
            }
            Self::Advanced {
                keyword,
                case_sensitive,
                remove_winners,
                ignored_roles,
            } => {
                let matches = if *case_sensitive {
                    text == keyword
                } else {
                    text.to_lowercase() == keyword.to_lowercase()
                };
                if !matches {
                    return Verdict::KeywordMismatch;
                }
                if *remove_winners && winners.iter().any(|w| w.user_id == message.user_id) {
                    return Verdict::PreviousWinner;
                }
                if let Some(role) = ignored_roles
                    .iter()
                    .copied()
                    .find(|role| message.has_badge(role.badge()))
                {
                    return Verdict::IgnoredRole(role);
                }
                Verdict::Qualified
            }
        }
    }
}

/// Evaluate `message` against `config`. Messages outside a capture window
/// never participate.
pub fn evaluate(
    message: &ChatMessage,
    config: &RaffleConfig,
    is_capturing: bool,
    winners: &[RaffleParticipant],
) -> Verdict {
    if !is_capturing {
        return Verdict::NotCapturing;
    }
    ParticipationPolicy::from_config(config).evaluate(message, winners)
}
