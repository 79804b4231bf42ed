// Champion skills: cooldown gate, duration windows and hitbox damage passes.

use std::collections::HashMap;

use super::catalog::ChampionKind;
use super::combat::defense_adjusted_damage;
use super::config::{TickClock, DASH_STEP};
use super::entity::{EntityId, EntityKind};
use super::events::GameEvent;
use super::game::Game;
use super::geometry::{Shape, Vector2};
use crate::metrics;

// Archetype tuning.
const WHIRLWIND_RADIUS: f32 = 5.0;
const WHIRLWIND_BASE_DAMAGE: f64 = 40.0;
const WHIRLWIND_DEFENSE_SCALE: f64 = 0.2;
const DASH_MAX_DISTANCE: f32 = 6.0;
const DASH_WIDTH: f32 = 2.0;
const DASH_DAMAGE: i32 = 150;
const BOLT_LENGTH: f32 = 8.0;
const BOLT_WIDTH: f32 = 4.0;
const BOLT_DAMAGE: i32 = 200;
const FIREBALL_RADIUS: f32 = 2.0;
const FIREBALL_SPEED: f32 = 6.0;
const FIREBALL_DAMAGE: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillKind {
    /// Spinning area around the caster.
    Whirlwind,
    /// Dash toward the aim point cutting through enemies on the way.
    ShadowDash,
    /// Wide rectangular shot in front of the caster.
    PiercingBolt,
    /// Slow projectile burning everything it passes.
    Fireball,
}

impl SkillKind {
    pub fn for_champion(kind: ChampionKind) -> Self {
        match kind {
            ChampionKind::MeleeAxe => SkillKind::Whirlwind,
            ChampionKind::AssassinSword => SkillKind::ShadowDash,
            ChampionKind::MarksmanCrossbow => SkillKind::PiercingBolt,
            ChampionKind::MageScepter => SkillKind::Fireball,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkillKind::Whirlwind => "whirlwind",
            SkillKind::ShadowDash => "shadow_dash",
            SkillKind::PiercingBolt => "piercing_bolt",
            SkillKind::Fireball => "fireball",
        }
    }
}

/// Inputs of one cast; kept for the whole window of a duration skill.
#[derive(Debug, Clone, PartialEq)]
pub struct CastSkillContext {
    pub match_id: String,
    pub caster: EntityId,
    pub aim: Vector2,
    pub target: Option<EntityId>,
    pub damage_dealt: i32,
    pub extra: HashMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationSpec {
    pub duration_ticks: i64,
    pub interval_ticks: i64,
}

/// Active window of a duration skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationWindow {
    pub start_tick: i64,
    pub end_tick: i64,
    pub next_damage_tick: i64,
}

#[derive(Debug, Clone)]
pub struct SkillComponent {
    pub kind: SkillKind,
    pub cooldown_ticks: i64,
    pub last_used_tick: i64,
    pub forbids_move: bool,
    pub forbids_attack: bool,
    pub duration: Option<DurationSpec>,
    pub window: Option<DurationWindow>,
    pub active: bool,
    pub cast: Option<CastSkillContext>,
    /// Current hitbox center of a travelling skill.
    pub projectile: Option<Vector2>,
    projectile_step: f32,
    pub passes: u32,
}

impl SkillComponent {
    pub fn for_champion(kind: ChampionKind, clock: &TickClock) -> Self {
        let skill = SkillKind::for_champion(kind);
        let (cooldown_s, forbids_move, forbids_attack, duration) = match skill {
            SkillKind::Whirlwind => (12.0, false, true, Some((5.0, 1.0))),
            SkillKind::ShadowDash => (8.0, false, false, None),
            SkillKind::PiercingBolt => (10.0, true, false, None),
            SkillKind::Fireball => (9.0, true, false, Some((2.0, 0.5))),
        };
        let cooldown_ticks = clock.seconds_to_ticks(cooldown_s);
        Self {
            kind: skill,
            cooldown_ticks,
            last_used_tick: -cooldown_ticks,
            forbids_move,
            forbids_attack,
            duration: duration.map(|(d, i)| DurationSpec {
                duration_ticks: clock.seconds_to_ticks(d),
                interval_ticks: clock.seconds_to_ticks(i).max(1),
            }),
            window: None,
            active: false,
            cast: None,
            projectile: None,
            projectile_step: clock.distance_per_tick(FIREBALL_SPEED),
            passes: 0,
        }
    }

    /// Overrides the duration window, in ticks.
    pub fn with_duration(mut self, duration_ticks: i64, interval_ticks: i64) -> Self {
        self.duration = Some(DurationSpec {
            duration_ticks,
            interval_ticks: interval_ticks.max(1),
        });
        self
    }

    pub fn is_ready(&self, tick: i64) -> bool {
        tick - self.last_used_tick >= self.cooldown_ticks
    }

    pub fn is_duration(&self) -> bool {
        self.duration.is_some()
    }

    pub fn blocks_moving(&self) -> bool {
        self.active && self.forbids_move
    }

    pub fn blocks_attacking(&self) -> bool {
        self.active && self.forbids_attack
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.window = None;
        self.cast = None;
        self.projectile = None;
    }
}

fn aim_direction(from: Vector2, aim: Vector2) -> Vector2 {
    let dir = (aim - from).normalize();
    if dir == Vector2::ZERO {
        Vector2::new(1.0, 0.0)
    } else {
        dir
    }
}

impl Game {
    /// Casts the skill of `caster_id` toward `aim`. Refused while on cooldown.
    pub fn use_skill(&mut self, caster_id: &EntityId, aim: Vector2) -> bool {
        let tick = self.tick;
        let match_id = self.match_id.clone();
        let Some(caster) = self.entities.get_mut(caster_id) else {
            return false;
        };
        if !caster.is_alive() {
            return false;
        }
        let origin = caster.position;
        let Some(skill) = caster.skill.as_ref() else {
            return false;
        };
        if !skill.is_ready(tick) {
            tracing::debug!(entity_id = %caster_id, tick, "Skill on cooldown");
            return false;
        }
        let (kind, forbids_move, forbids_attack) =
            (skill.kind, skill.forbids_move, skill.forbids_attack);

        if forbids_move {
            caster.stop_moving();
        }
        if forbids_attack {
            caster.stop_attacking();
        }

        let skill_length = match kind {
            SkillKind::Whirlwind => WHIRLWIND_RADIUS,
            SkillKind::ShadowDash => origin.distance(aim).min(DASH_MAX_DISTANCE),
            SkillKind::PiercingBolt => BOLT_LENGTH,
            SkillKind::Fireball => {
                FIREBALL_SPEED * self.clock.ticks_to_seconds(
                    caster
                        .skill
                        .as_ref()
                        .and_then(|s| s.duration)
                        .map_or(0, |d| d.duration_ticks),
                ) as f32
            }
        };

        if let Some(skill) = caster.skill.as_mut() {
            skill.cast = Some(CastSkillContext {
                match_id,
                caster: caster_id.clone(),
                aim,
                target: None,
                damage_dealt: 0,
                extra: HashMap::new(),
            });
            skill.active = true;
            skill.passes = 0;
            if let Some(timing) = skill.duration {
                skill.window = Some(DurationWindow {
                    start_tick: tick,
                    end_tick: tick + timing.duration_ticks,
                    next_damage_tick: tick,
                });
            }
            if kind == SkillKind::Fireball {
                skill.projectile = Some(origin);
            }
        }

        self.emit(GameEvent::SkillCast {
            caster: caster_id.clone(),
            aim,
            skill_length,
        });
        tracing::debug!(match_id = %self.match_id, entity_id = %caster_id, skill = kind.label(), tick, "Skill cast");
        metrics::SKILLS_CAST_TOTAL
            .with_label_values(&[kind.label()])
            .inc();

        match kind {
            SkillKind::Whirlwind | SkillKind::Fireball => {
                self.run_duration_pass(caster_id);
            }
            SkillKind::PiercingBolt => {
                let dir = aim_direction(origin, aim);
                let hitbox =
                    Shape::oriented_rect(origin + dir * (BOLT_LENGTH / 2.0), BOLT_LENGTH, BOLT_WIDTH, dir);
                self.skill_hit(caster_id, hitbox, BOLT_DAMAGE);
            }
            SkillKind::ShadowDash => {
                let end = self.dash(caster_id, origin, aim);
                let dir = aim_direction(origin, aim);
                let travelled = origin.distance(end).max(DASH_WIDTH / 2.0);
                let hitbox =
                    Shape::oriented_rect(origin + (end - origin) * 0.5, travelled, DASH_WIDTH, dir);
                self.skill_hit(caster_id, hitbox, DASH_DAMAGE);
            }
        }

        if let Some(skill) = self
            .entities
            .get_mut(caster_id)
            .and_then(|e| e.skill.as_mut())
        {
            if !skill.is_duration() {
                skill.deactivate();
            }
            skill.last_used_tick = tick;
        }
        true
    }

    /// Per-tick driver for active duration skills.
    pub(crate) fn update_skills(&mut self) {
        let tick = self.tick;
        let casters: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.skill.as_ref().is_some_and(|s| s.active && s.window.is_some()))
            .map(|e| e.id.clone())
            .collect();

        for id in casters {
            let Some(caster) = self.entities.get_mut(&id) else {
                continue;
            };
            let Some(skill) = caster.skill.as_ref() else {
                continue;
            };
            let (forbids_move, forbids_attack) = (skill.forbids_move, skill.forbids_attack);
            if forbids_move {
                caster.stop_moving();
            }
            if forbids_attack {
                caster.stop_attacking();
            }

            let Some(skill) = caster.skill.as_mut() else {
                continue;
            };
            let Some(window) = skill.window else {
                continue;
            };
            if tick >= window.end_tick {
                tracing::debug!(entity_id = %id, tick, passes = skill.passes, "Skill ended");
                skill.deactivate();
                continue;
            }
            if let (Some(pos), Some(cast)) = (skill.projectile, skill.cast.as_ref()) {
                skill.projectile = Some(pos.move_towards(cast.aim, skill.projectile_step));
            }
            self.run_duration_pass(&id);
        }
    }

    /// Runs one damage pass if the window's next damage tick has come.
    fn run_duration_pass(&mut self, caster_id: &EntityId) {
        let tick = self.tick;
        let Some(caster) = self.entities.get(caster_id) else {
            return;
        };
        let Some(skill) = caster.skill.as_ref() else {
            return;
        };
        let Some(window) = skill.window else {
            return;
        };
        if tick < window.next_damage_tick {
            return;
        }
        let (hitbox, damage) = match skill.kind {
            SkillKind::Whirlwind => (
                Shape::circle(caster.position, WHIRLWIND_RADIUS),
                (WHIRLWIND_BASE_DAMAGE + WHIRLWIND_DEFENSE_SCALE * caster.defense as f64) as i32,
            ),
            SkillKind::Fireball => (
                Shape::circle(skill.projectile.unwrap_or(caster.position), FIREBALL_RADIUS),
                FIREBALL_DAMAGE,
            ),
            SkillKind::ShadowDash | SkillKind::PiercingBolt => return,
        };
        let interval = skill.duration.map_or(1, |d| d.interval_ticks);

        if let Some(skill) = self
            .entities
            .get_mut(caster_id)
            .and_then(|e| e.skill.as_mut())
        {
            if let Some(w) = skill.window.as_mut() {
                w.next_damage_tick += interval;
            }
            skill.passes += 1;
        }
        self.skill_hit(caster_id, hitbox, damage);
    }

    /// Damages every living enemy slot-owned entity whose position is inside `hitbox`.
    /// Gold mines are never hit by skills. Returns the total damage dealt.
    pub(crate) fn skill_hit(&mut self, caster_id: &EntityId, hitbox: Shape, base_damage: i32) -> i32 {
        let Some(caster) = self.entities.get(caster_id) else {
            return 0;
        };
        let hits: Vec<(EntityId, i32)> = self
            .entities
            .values()
            .filter(|e| {
                e.is_alive()
                    && !matches!(e.kind, EntityKind::GoldMine)
                    && caster.is_enemy_of(e)
                    && hitbox.contains(e.position)
            })
            .map(|e| (e.id.clone(), defense_adjusted_damage(base_damage, e.defense)))
            .collect();

        let mut total = 0;
        for (target, amount) in hits {
            total += amount;
            self.apply_damage(&target, amount, Some(caster_id));
        }

        if let Some(cast) = self
            .entities
            .get_mut(caster_id)
            .and_then(|e| e.skill.as_mut())
            .and_then(|s| s.cast.as_mut())
        {
            cast.damage_dealt += total;
        }
        total
    }

    /// Moves the caster up to the dash distance toward `aim`, stopping at the
    /// last walkable point. Returns the end position.
    fn dash(&mut self, caster_id: &EntityId, origin: Vector2, aim: Vector2) -> Vector2 {
        let dir = (aim - origin).normalize();
        let distance = origin.distance(aim).min(DASH_MAX_DISTANCE);
        let mut end = origin;
        if dir != Vector2::ZERO {
            let mut travelled = 0.0;
            while travelled < distance {
                let step = DASH_STEP.min(distance - travelled);
                let next = end + dir * step;
                if !self.map.grid.is_walkable_position(next) {
                    break;
                }
                end = next;
                travelled += step;
            }
        }

        if let Some(caster) = self.entities.get_mut(caster_id) {
            caster.stop_moving();
            if end != origin {
                caster.position = end;
                let speed = caster.moving.as_ref().map_or(0.0, |m| m.speed);
                self.emit(GameEvent::PositionChanged {
                    id: caster_id.clone(),
                    position: end,
                    speed,
                });
            }
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_skill_is_ready() {
        let clock = TickClock::new(50);
        let s = SkillComponent::for_champion(ChampionKind::MeleeAxe, &clock);
        assert_eq!(s.cooldown_ticks, 240);
        assert!(s.is_ready(0));
        assert_eq!(
            s.duration,
            Some(DurationSpec {
                duration_ticks: 100,
                interval_ticks: 20
            })
        );
        assert!(!s.blocks_attacking());
    }

    #[test]
    fn test_cooldown_gate() {
        let clock = TickClock::new(50);
        let mut s = SkillComponent::for_champion(ChampionKind::MarksmanCrossbow, &clock);
        s.last_used_tick = 100;
        assert!(!s.is_ready(100 + s.cooldown_ticks - 1));
        assert!(s.is_ready(100 + s.cooldown_ticks));
    }

    #[test]
    fn test_restrictions_only_while_active() {
        let clock = TickClock::new(50);
        let mut s = SkillComponent::for_champion(ChampionKind::MageScepter, &clock);
        assert!(!s.blocks_moving());
        s.active = true;
        assert!(s.blocks_moving());
        assert!(!s.blocks_attacking());
        s.deactivate();
        assert!(!s.blocks_moving());
    }

    #[test]
    fn test_aim_direction_fallback() {
        let p = Vector2::new(2.0, 2.0);
        assert_eq!(aim_direction(p, p), Vector2::new(1.0, 0.0));
        assert_eq!(aim_direction(p, Vector2::new(2.0, 5.0)), Vector2::new(0.0, 1.0));
    }
}
