// End-to-end match scenarios driven through the public engine API.

use std::sync::Arc;

use arena_backend::engine::catalog::{ChampionKind, GameData};
use arena_backend::engine::config::TickClock;
use arena_backend::engine::entity::EntityId;
use arena_backend::engine::events::GameEvent;
use arena_backend::engine::game::{Game, MatchSetup, PlayerSeat};
use arena_backend::engine::geometry::Vector2;
use arena_backend::net::messages::{from_events, Message};

fn duel(slot0: ChampionKind, slot1: ChampionKind) -> Game {
    let setup = MatchSetup {
        match_id: Some("flow".into()),
        map_id: "arena".into(),
        players: vec![
            PlayerSeat {
                slot: 0,
                user_id: Some("alice".into()),
                champion: slot0,
            },
            PlayerSeat {
                slot: 1,
                user_id: Some("bob".into()),
                champion: slot1,
            },
        ],
    };
    Game::new(
        "flow".into(),
        &setup,
        Arc::new(GameData::builtin()),
        TickClock::default(),
        Some(11),
    )
    .unwrap()
}

fn id(s: &str) -> EntityId {
    EntityId::from(s)
}

fn place(game: &mut Game, entity: &str, x: f32, y: f32) {
    game.entity_mut(&id(entity)).unwrap().position = Vector2::new(x, y);
}

fn hp(game: &Game, entity: &str) -> i32 {
    game.entity(&id(entity)).unwrap().hp().0
}

fn hits_on(events: &[GameEvent], target: &str) -> Vec<i32> {
    events
        .iter()
        .filter_map(|e| match e {
            GameEvent::HealthChanged {
                target: t, damage, ..
            } if t.as_str() == target => Some(*damage),
            _ => None,
        })
        .collect()
}

fn tick_collect(game: &mut Game, ticks: usize) -> Vec<GameEvent> {
    let mut out = Vec::new();
    for _ in 0..ticks {
        game.tick();
        out.extend(game.drain_events().into_iter().map(|e| e.event));
    }
    out
}

#[test]
fn test_attacker_just_out_of_range_closes_in_then_hits() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    place(&mut game, "champion_0", 18.5, 20.5);
    place(&mut game, "champion_1", 20.1, 20.5);

    assert_eq!(
        game.order_attack(0, &id("champion_0"), &id("champion_1")),
        Ok(true)
    );

    // First tick: 1.6 > 1.5, so the attacker only starts walking.
    let first = tick_collect(&mut game, 1);
    assert!(hits_on(&first, "champion_1").is_empty());
    assert!(game.entity(&id("champion_0")).unwrap().is_moving());
    assert_eq!(hp(&game, "champion_1"), 800);

    // Second tick: one step of 0.2 brings it in range and the hit lands.
    let second = tick_collect(&mut game, 1);
    assert_eq!(hits_on(&second, "champion_1"), vec![69]);
    assert_eq!(hp(&game, "champion_1"), 731);
    let attacker = game.entity(&id("champion_0")).unwrap();
    assert!((attacker.position.x - 18.7).abs() < 1e-4);
    assert!(second.iter().any(|e| matches!(
        e,
        GameEvent::AttackAnimation { attacker, .. } if attacker.as_str() == "champion_0"
    )));

    // The next hit waits out the attack delay (20 ticks at 1 attack/s).
    let cooldown = tick_collect(&mut game, 19);
    assert!(hits_on(&cooldown, "champion_1").is_empty());
    let next = tick_collect(&mut game, 1);
    assert_eq!(hits_on(&next, "champion_1"), vec![69]);
}

#[test]
fn test_unit_range_attacker_a_hair_out_of_reach() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    game.entity_mut(&id("champion_0"))
        .unwrap()
        .attack
        .as_mut()
        .unwrap()
        .range = 1.0;
    place(&mut game, "champion_0", 18.5, 20.5);
    place(&mut game, "champion_1", 19.55, 20.5);

    assert_eq!(
        game.order_attack(0, &id("champion_0"), &id("champion_1")),
        Ok(true)
    );

    // 1.05 > 1.0: the first attempt only issues a move order.
    let first = tick_collect(&mut game, 1);
    assert!(hits_on(&first, "champion_1").is_empty());
    assert!(game.entity(&id("champion_0")).unwrap().is_moving());
    assert_eq!(hp(&game, "champion_1"), 800);

    // One step closes the gap and the defense-adjusted hit lands.
    let second = tick_collect(&mut game, 1);
    assert_eq!(hits_on(&second, "champion_1"), vec![69]);
    assert_eq!(hp(&game, "champion_1"), 800 - 69);
}

#[test]
fn test_skill_recast_during_cooldown_changes_nothing() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    place(&mut game, "champion_0", 20.5, 20.5);

    assert!(game.order_skill(0, Vector2::new(22.5, 20.5)));
    tick_collect(&mut game, 1);
    let before = game.entity(&id("champion_0")).unwrap().skill.clone().unwrap();

    assert!(!game.order_skill(0, Vector2::new(18.5, 20.5)));
    let events: Vec<GameEvent> = game.drain_events().into_iter().map(|e| e.event).collect();
    assert!(!events
        .iter()
        .any(|e| matches!(e, GameEvent::SkillCast { .. })));
    assert!(events.is_empty());

    let after = game.entity(&id("champion_0")).unwrap().skill.clone().unwrap();
    assert_eq!(after.last_used_tick, before.last_used_tick);
    assert_eq!(after.passes, before.passes);
    assert_eq!(after.active, before.active);
}

#[test]
fn test_attack_on_own_entity_is_refused() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    assert_eq!(
        game.order_attack(0, &id("champion_0"), &id("tower_0_0")),
        Ok(false)
    );
    assert!(game.order_attack(1, &id("champion_0"), &id("champion_1")).is_err());
}

#[test]
fn test_whirlwind_runs_exactly_five_passes() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    place(&mut game, "champion_0", 20.5, 20.5);
    place(&mut game, "champion_1", 22.5, 20.5);

    assert!(game.order_skill(0, Vector2::new(22.5, 20.5)));
    let mut events: Vec<GameEvent> = game.drain_events().into_iter().map(|e| e.event).collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::SkillCast { .. })));

    events.extend(tick_collect(&mut game, 120));

    // 40 + 0.2 * 40 defense = 48, adjusted by the target's 15 defense.
    assert_eq!(hits_on(&events, "champion_1"), vec![41; 5]);
    assert_eq!(hp(&game, "champion_1"), 800 - 5 * 41);

    let skill = game.entity(&id("champion_0")).unwrap().skill.clone().unwrap();
    assert_eq!(skill.passes, 5);
    assert!(!skill.active);

    // Still cooling down: 12s cooldown is 240 ticks.
    assert!(!game.order_skill(0, Vector2::new(22.5, 20.5)));
}

#[test]
fn test_destroying_burg_ends_match_and_reaches_the_wire() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    place(&mut game, "champion_0", 33.5, 36.0);
    game.entity_mut(&id("burg_1"))
        .unwrap()
        .health
        .as_mut()
        .unwrap()
        .set_current_hp(1);

    assert_eq!(
        game.order_attack(0, &id("champion_0"), &id("burg_1")),
        Ok(true)
    );

    let mut wire = Vec::new();
    for _ in 0..40 {
        game.tick();
        wire.extend(from_events(game.drain_events(), 0));
        if game.is_over() {
            break;
        }
    }

    assert_eq!(game.winner(), Some(0));
    assert!(game.entity(&id("burg_1")).is_none());
    assert!(game.entity(&id("champion_1")).is_none());
    assert!(wire.iter().any(|(_, m)| matches!(
        m,
        Message::GameOver(g) if g.winner_slot == 0
    )));
    assert!(wire
        .iter()
        .any(|(_, m)| matches!(m, Message::SlotEliminated(s) if s.slot == 1)));

    let tick = game.tick;
    game.tick();
    assert_eq!(game.tick, tick);
}

#[test]
fn test_troop_purchase_marches_on_enemy_burg() {
    let mut game = duel(ChampionKind::MeleeAxe, ChampionKind::MarksmanCrossbow);
    assert_eq!(game.order_troop(0, 0), Ok(true));
    let troop = id("troop_0_0");
    let start = game.entity(&troop).unwrap().position;
    assert_eq!(game.slot(0).unwrap().gold.current(), 50);

    tick_collect(&mut game, 40);
    let now = game.entity(&troop).unwrap().position;
    let burg = game.entity(&id("burg_1")).unwrap().position;
    assert!(now.distance(burg) < start.distance(burg));
}
