//! Ticket pool construction and weighted winner draw.

use rand::Rng;
use rand::rngs::OsRng;

use crate::chat::{BADGE_SUBSCRIBER, BADGE_VIP, has_badge};
use crate::config::RaffleConfig;
use crate::raffle::RaffleParticipant;

/// Participants allowed into the next draw.
pub fn eligible_participants<'a>(
    participants: &'a [RaffleParticipant],
    config: &RaffleConfig,
) -> Vec<&'a RaffleParticipant> {
    participants
        .iter()
        .filter(|p| !(config.remove_winners && p.is_winner))
        .collect()
}

/// Number of tickets a participant holds, from the badges captured when
/// they joined.
pub fn tickets_for(participant: &RaffleParticipant, config: &RaffleConfig) -> usize {
    let mut tickets = config.base_ticket_value.max(1) as usize;
    if config.subs_extra_tickets
        && !config.ignore_subs
        && has_badge(&participant.badges, BADGE_SUBSCRIBER)
    {
        tickets += config.subs_extra_value as usize;
    }
    if config.vips_extra_tickets
        && !config.ignore_vips
        && has_badge(&participant.badges, BADGE_VIP)
    {
        tickets += config.vips_extra_value as usize;
    }
    tickets
}

/// One entry per ticket, each referencing its holder.
pub fn build_ticket_pool<'a>(
    participants: &'a [RaffleParticipant],
    config: &RaffleConfig,
) -> Vec<&'a RaffleParticipant> {
    eligible_participants(participants, config)
        .into_iter()
        .flat_map(|p| std::iter::repeat_n(p, tickets_for(p, config)))
        .collect()
}

/// Draw from the pool with the operating system CSPRNG.
pub fn draw<'a>(pool: &[&'a RaffleParticipant]) -> Option<&'a RaffleParticipant> {
    draw_with_rng(pool, &mut OsRng)
}

/// Pick one ticket uniformly. Returns `None` for an empty pool.
pub fn draw_with_rng<'a, R: Rng + ?Sized>(
    pool: &[&'a RaffleParticipant],
    rng: &mut R,
) -> Option<&'a RaffleParticipant> {
    if pool.is_empty() {
        return None;
    }
    let picked = rng.gen_range(0..pool.len());
    Some(pool[picked])
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
