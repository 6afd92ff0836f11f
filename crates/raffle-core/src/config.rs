//! Raffle configuration and its validated update path.

use serde::{Deserialize, Serialize};

const DEFAULT_EXTRA_TICKETS: u32 = 1;
const DEFAULT_BASE_TICKET_VALUE: u32 = 1;

/// Upper bound for each ticket value. Tickets are materialized as pool
/// entries, so this caps the pool at a few thousand entries per participant.
pub const MAX_TICKET_VALUE: u32 = 1000;

/// Rules applied to chat messages and to the winner draw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RaffleConfig {
    pub keyword: String,
    pub advanced: bool,
    pub case_sensitive: bool,
    pub ignore_mods: bool,
    pub ignore_subs: bool,
    pub ignore_vips: bool,
    pub subs_extra_tickets: bool,
    pub subs_extra_value: u32,
    pub vips_extra_tickets: bool,
    pub vips_extra_value: u32,
    pub remove_winners: bool,
    pub base_ticket_value: u32,
}

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            advanced: false,
            case_sensitive: false,
            ignore_mods: false,
            ignore_subs: false,
            ignore_vips: false,
            subs_extra_tickets: false,
            subs_extra_value: DEFAULT_EXTRA_TICKETS,
            vips_extra_tickets: false,
            vips_extra_value: DEFAULT_EXTRA_TICKETS,
            remove_winners: true,
            base_ticket_value: DEFAULT_BASE_TICKET_VALUE,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("subs_extra_value must be at least 1 when subscriber bonus tickets are enabled")]
    InvalidSubsExtraValue,
    #[error("vips_extra_value must be at least 1 when vip bonus tickets are enabled")]
    InvalidVipsExtraValue,
    #[error("base_ticket_value must be at least 1")]
    InvalidBaseTicketValue,
    #[error("{field} must not exceed {max}")]
    TicketValueTooLarge { field: &'static str, max: u32 },
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RaffleConfigUpdate {
    pub keyword: Option<String>,
    pub advanced: Option<bool>,
    pub case_sensitive: Option<bool>,
    pub ignore_mods: Option<bool>,
    pub ignore_subs: Option<bool>,
    pub ignore_vips: Option<bool>,
    pub subs_extra_tickets: Option<bool>,
    pub subs_extra_value: Option<u32>,
    pub vips_extra_tickets: Option<bool>,
    pub vips_extra_value: Option<u32>,
    pub remove_winners: Option<bool>,
    pub base_ticket_value: Option<u32>,
}

impl RaffleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subs_extra_tickets && self.subs_extra_value < 1 {
            return Err(ConfigError::InvalidSubsExtraValue);
        }
        if self.vips_extra_tickets && self.vips_extra_value < 1 {
            return Err(ConfigError::InvalidVipsExtraValue);
        }
        if self.base_ticket_value < 1 {
            return Err(ConfigError::InvalidBaseTicketValue);
        }
        for (field, value) in [
            ("base_ticket_value", self.base_ticket_value),
            ("subs_extra_value", self.subs_extra_value),
            ("vips_extra_value", self.vips_extra_value),
        ] {
            if value > MAX_TICKET_VALUE {
                return Err(ConfigError::TicketValueTooLarge {
                    field,
                    max: MAX_TICKET_VALUE,
                });
            }
        }
        Ok(())
    }

    /// Apply `update` atomically: the config is left unchanged when the
    /// merged result is invalid.
    pub fn apply(&mut self, update: RaffleConfigUpdate) -> Result<(), ConfigError> {
        let mut next = self.clone();
        if let Some(v) = update.keyword {
            next.keyword = v;
        }
        if let Some(v) = update.advanced {
            next.advanced = v;
        }
        if let Some(v) = update.case_sensitive {
            next.case_sensitive = v;
        }
        if let Some(v) = update.ignore_mods {
            next.ignore_mods = v;
        }
        if let Some(v) = update.ignore_subs {
            next.ignore_subs = v;
        }
        if let Some(v) = update.ignore_vips {
            next.ignore_vips = v;
        }
        if let Some(v) = update.subs_extra_tickets {
            next.subs_extra_tickets = v;
        }
        if let Some(v) = update.subs_extra_value {
            next.subs_extra_value = v;
        }
        if let Some(v) = update.vips_extra_tickets {
            next.vips_extra_tickets = v;
        }
        if let Some(v) = update.vips_extra_value {
            next.vips_extra_value = v;
        }
        if let Some(v) = update.remove_winners {
            next.remove_winners = v;
        }
        if let Some(v) = update.base_ticket_value {
            next.base_ticket_value = v;
        }

        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Copy of the config without the keyword, which is never persisted.
    pub fn without_keyword(&self) -> Self {
        Self {
            keyword: String::new(),
            ..self.clone()
        }
    }
}
