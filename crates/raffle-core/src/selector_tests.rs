use super::*;
use crate::chat::Badge;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn participant(user_id: &str, badges: &[&str]) -> RaffleParticipant {
    RaffleParticipant {
        user_id: user_id.to_string(),
        username: user_id.to_string(),
        display_name: user_id.to_string(),
        message: "go".to_string(),
        captured_at: Utc::now(),
        is_winner: false,
        badges: badges.iter().map(|b| Badge::new(*b, "1")).collect(),
    }
}

fn bonus_config() -> RaffleConfig {
    RaffleConfig {
        keyword: "go".into(),
        subs_extra_tickets: true,
        subs_extra_value: 3,
        ..Default::default()
    }
}

#[test]
fn subscriber_bonus_adds_extra_tickets() {
    let participants = vec![participant("u1", &["subscriber"])];
    let config = bonus_config();

    assert_eq!(tickets_for(&participants[0], &config), 4);
    assert_eq!(build_ticket_pool(&participants, &config).len(), 4);
}

#[test]
fn bonus_ignored_when_role_is_ignored_or_flag_disabled() {
    let sub = participant("u1", &["subscriber"]);
    let mut config = bonus_config();
    config.ignore_subs = true;
    assert_eq!(tickets_for(&sub, &config), 1);

    config.ignore_subs = false;
    config.subs_extra_tickets = false;
    assert_eq!(tickets_for(&sub, &config), 1);
}

#[test]
fn vip_and_sub_bonuses_stack() {
    let both = participant("u1", &["subscriber", "vip"]);
    let config = RaffleConfig {
        vips_extra_tickets: true,
        vips_extra_value: 2,
        base_ticket_value: 2,
        ..bonus_config()
    };
    assert_eq!(tickets_for(&both, &config), 2 + 3 + 2);
}

#[test]
fn winners_are_excluded_only_with_remove_winners() {
    let mut participants = vec![participant("u1", &[]), participant("u2", &[])];
    participants[0].is_winner = true;

    let mut config = RaffleConfig::default();
    config.remove_winners = true;
    let pool = build_ticket_pool(&participants, &config);
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].user_id, "u2");

    config.remove_winners = false;
    assert_eq!(build_ticket_pool(&participants, &config).len(), 2);
}

#[test]
fn empty_pool_is_never_drawn() {
    let mut rng = StdRng::seed_from_u64(7);
    assert!(draw_with_rng(&[], &mut rng).is_none());
    assert!(draw(&[]).is_none());
}

#[test]
fn weighted_draw_converges_to_ticket_ratio() {
    let participants = vec![participant("sub", &["subscriber"]), participant("pleb", &[])];
    let config = bonus_config();
    let pool = build_ticket_pool(&participants, &config);
    assert_eq!(pool.len(), 5);

    let mut rng = StdRng::seed_from_u64(42);
    let mut sub_wins = 0u32;
    let mut pleb_wins = 0u32;
    for _ in 0..10_000 {
        match draw_with_rng(&pool, &mut rng).map(|p| p.user_id.as_str()) {
            Some("sub") => sub_wins += 1,
            Some("pleb") => pleb_wins += 1,
            other => panic!("unexpected draw {other:?}"),
        }
    }

    let ratio = f64::from(sub_wins) / f64::from(pleb_wins);
    assert!((3.5..4.6).contains(&ratio), "ratio {ratio}");
}
