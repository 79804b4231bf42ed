// Attack orders, range and cadence gating, and per-kind damage strategies.

use std::collections::HashMap;

use super::config::TickClock;
use super::entity::{Entity, EntityId, EntityKind};
use super::events::GameEvent;
use super::game::Game;

/// One attack attempt's inputs. Rebuilt from the stored order every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackContext {
    pub match_id: String,
    pub attacker: EntityId,
    pub target: EntityId,
    pub current_tick: i64,
    pub timestamp: i64,
    pub extra: HashMap<String, f64>,
}

impl AttackContext {
    pub fn new(match_id: &str, attacker: EntityId, target: EntityId, tick: i64) -> Self {
        Self {
            match_id: match_id.to_string(),
            attacker,
            target,
            current_tick: tick,
            timestamp: chrono::Utc::now().timestamp_millis(),
            extra: HashMap::new(),
        }
    }
}

/// `max(1, floor(damage * 100 / (100 + defense)))`.
pub fn defense_adjusted_damage(damage: i32, defense: i32) -> i32 {
    if damage <= 0 {
        return 0;
    }
    let defense = defense.max(0) as i64;
    let adjusted = (damage as i64 * 100) / (100 + defense);
    adjusted.max(1) as i32
}

/// Which strategy applies an entity's attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Champion,
    Troop,
    Tower,
}

impl StrategyKind {
    pub fn strategy(self) -> &'static dyn AttackStrategy {
        match self {
            StrategyKind::Champion => &ChampionAttack,
            StrategyKind::Troop => &TroopAttack,
            StrategyKind::Tower => &TowerAttack,
        }
    }
}

/// Per-kind targeting rules and damage application.
pub trait AttackStrategy: Sync {
    fn can_target(&self, attacker: &Entity, target: &Entity) -> bool;

    /// Applies one hit. Returns false if the hit did not land.
    fn execute(&self, game: &mut Game, ctx: &AttackContext) -> bool {
        let Some((attacker, target)) = game.pair(&ctx.attacker, &ctx.target) else {
            return false;
        };
        if !self.can_target(attacker, target) {
            return false;
        }
        let attack_speed = attacker.attack.as_ref().map_or(0.0, |a| a.attack_speed);
        game.emit(GameEvent::AttackAnimation {
            attacker: ctx.attacker.clone(),
            target: ctx.target.clone(),
            attack_speed,
        });
        game.receive_attack(&ctx.attacker, &ctx.target);
        true
    }
}

/// Champions hit enemies of any kind and neutral gold mines.
pub struct ChampionAttack;

impl AttackStrategy for ChampionAttack {
    fn can_target(&self, attacker: &Entity, target: &Entity) -> bool {
        target.is_alive()
            && (attacker.is_enemy_of(target) || matches!(target.kind, EntityKind::GoldMine))
    }
}

/// Troops never attack neutral entities or allies.
pub struct TroopAttack;

impl AttackStrategy for TroopAttack {
    fn can_target(&self, attacker: &Entity, target: &Entity) -> bool {
        target.is_alive() && target.owner.is_some() && attacker.is_enemy_of(target)
    }
}

/// Structures shoot enemy units.
pub struct TowerAttack;

impl AttackStrategy for TowerAttack {
    fn can_target(&self, attacker: &Entity, target: &Entity) -> bool {
        target.is_alive() && target.kind.is_unit() && attacker.is_enemy_of(target)
    }
}

#[derive(Debug, Clone)]
pub struct AttackComponent {
    pub damage: i32,
    pub attack_speed: f32,
    pub range: f32,
    pub attack_delay_ticks: i64,
    pub next_attack_tick: i64,
    /// Flat damage dealt to gold mines, ignoring `damage`.
    pub gold_mine_damage: i32,
    pub strategy: StrategyKind,
    context: Option<AttackContext>,
}

impl AttackComponent {
    pub fn new(
        damage: i32,
        attack_speed: f32,
        range: f32,
        gold_mine_damage: i32,
        strategy: StrategyKind,
        clock: &TickClock,
    ) -> Self {
        Self {
            damage,
            attack_speed,
            range,
            attack_delay_ticks: clock.attack_delay_ticks(attack_speed),
            next_attack_tick: 0,
            gold_mine_damage,
            strategy,
            context: None,
        }
    }

    pub fn context(&self) -> Option<&AttackContext> {
        self.context.as_ref()
    }

    pub fn is_attacking(&self) -> bool {
        self.context.is_some()
    }

    pub fn target_id(&self) -> Option<&EntityId> {
        self.context.as_ref().map(|c| &c.target)
    }

    /// Raw setter; skill restrictions are checked by `Entity::set_attack_context`.
    pub(crate) fn set_context(&mut self, ctx: Option<AttackContext>) {
        self.context = ctx;
    }
}

impl Game {
    /// Orders `attacker` to attack `target`. Refused when the strategy rejects the
    /// target or an active skill forbids attacking.
    pub fn begin_attack(&mut self, attacker: &EntityId, target: &EntityId) -> bool {
        let allowed = match self.pair(attacker, target) {
            Some((a, t)) => a
                .attack
                .as_ref()
                .is_some_and(|atk| atk.strategy.strategy().can_target(a, t)),
            None => false,
        };
        if !allowed {
            return false;
        }
        let ctx = AttackContext::new(&self.match_id, attacker.clone(), target.clone(), self.tick);
        self.entities
            .get_mut(attacker)
            .is_some_and(|e| e.set_attack_context(Some(ctx)))
    }

    /// Clears the attack order of `attacker`.
    pub fn stop_attack(&mut self, attacker: &EntityId) {
        if let Some(e) = self.entities.get_mut(attacker) {
            e.stop_attacking();
        }
    }

    /// Force-stops every entity currently attacking `target`.
    pub(crate) fn stop_attackers_of(&mut self, target: &EntityId) {
        for e in self.entities.values_mut() {
            if e.attack_target() == Some(target) {
                e.stop_attacking();
            }
        }
    }

    /// Advances the attack order of one entity. Returns true if a hit was made.
    pub fn perform_attack(&mut self, attacker_id: &EntityId) -> bool {
        let tick = self.tick;
        let Some(attacker) = self.entities.get(attacker_id) else {
            return false;
        };
        let Some(attack) = attacker.attack.as_ref() else {
            return false;
        };
        let Some(mut ctx) = attack.context().cloned() else {
            return false;
        };
        let (range, next_attack_tick, delay, strategy) = (
            attack.range,
            attack.next_attack_tick,
            attack.attack_delay_ticks,
            attack.strategy,
        );

        let target = match self.entities.get(&ctx.target) {
            Some(t) if t.is_alive() => t,
            _ => {
                self.stop_attack(attacker_id);
                return false;
            }
        };

        if attacker.distance_to(target) > range {
            let goal = target.position;
            self.issue_move(attacker_id, goal, false);
            return false;
        }

        if tick < next_attack_tick {
            return false;
        }

        let same_slot = attacker.same_slot(target);
        if let Some(e) = self.entities.get_mut(attacker_id) {
            e.stop_moving();
        }
        if same_slot {
            self.stop_attack(attacker_id);
            return false;
        }

        ctx.current_tick = tick;
        ctx.timestamp = chrono::Utc::now().timestamp_millis();
        let landed = strategy.strategy().execute(self, &ctx);

        let target_alive = self
            .entities
            .get(&ctx.target)
            .is_some_and(Entity::is_alive);
        if let Some(e) = self.entities.get_mut(attacker_id) {
            if !target_alive || !landed {
                e.stop_attacking();
            }
            if let Some(a) = e.attack.as_mut() {
                a.next_attack_tick = tick + delay;
            }
        }
        landed
    }

    /// Applies one hit from `attacker_id` to `target_id` using the target's damage rule.
    pub(crate) fn receive_attack(&mut self, attacker_id: &EntityId, target_id: &EntityId) {
        let Some((attacker, target)) = self.pair(attacker_id, target_id) else {
            return;
        };
        let Some(attack) = attacker.attack.as_ref() else {
            return;
        };
        let amount = match target.kind {
            EntityKind::GoldMine => attack.gold_mine_damage,
            _ => defense_adjusted_damage(attack.damage, target.defense),
        };
        self.apply_damage(target_id, amount, Some(attacker_id));
    }
}
