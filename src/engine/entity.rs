// Entities and their optional capability components.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::catalog::{BuildingDef, ChampionDef, ChampionKind, GoldMineProfile, Slot, TroopDef};
use super::combat::{AttackComponent, AttackContext, StrategyKind};
use super::config::*;
use super::geometry::Vector2;
use super::health::HealthComponent;
use super::movement::{MoveContext, MovingComponent};
use super::skill::SkillComponent;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Champion(ChampionKind),
    Troop(i16),
    Tower,
    Burg,
    GoldMine,
}

impl EntityKind {
    pub fn code(self) -> u8 {
        match self {
            EntityKind::Champion(_) => KIND_CHAMPION,
            EntityKind::Troop(_) => KIND_TROOP,
            EntityKind::Tower => KIND_TOWER,
            EntityKind::Burg => KIND_BURG,
            EntityKind::GoldMine => KIND_GOLD_MINE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Champion(_) => "champion",
            EntityKind::Troop(_) => "troop",
            EntityKind::Tower => "tower",
            EntityKind::Burg => "burg",
            EntityKind::GoldMine => "gold_mine",
        }
    }

    pub fn is_unit(self) -> bool {
        matches!(self, EntityKind::Champion(_) | EntityKind::Troop(_))
    }
}

/// Axis-aligned extent; zero for units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Footprint {
    /// Extent along x.
    pub width: f32,
    /// Extent along y.
    pub length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoldMineComponent {
    pub capacity: i32,
    pub is_small: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub owner: Option<Slot>,
    pub position: Vector2,
    pub footprint: Footprint,
    pub defense: i32,
    /// Radius within which an idle entity looks for targets on its own.
    pub detection_range: f32,
    pub health: Option<HealthComponent>,
    pub attack: Option<AttackComponent>,
    pub moving: Option<MovingComponent>,
    pub skill: Option<SkillComponent>,
    pub gold_mine: Option<GoldMineComponent>,
}

impl Entity {
    fn bare(id: EntityId, kind: EntityKind, owner: Option<Slot>, position: Vector2) -> Self {
        Self {
            id,
            kind,
            owner,
            position,
            footprint: Footprint::default(),
            defense: 0,
            detection_range: 0.0,
            health: None,
            attack: None,
            moving: None,
            skill: None,
            gold_mine: None,
        }
    }

    pub fn champion(
        id: EntityId,
        slot: Slot,
        def: &ChampionDef,
        position: Vector2,
        clock: &TickClock,
    ) -> Self {
        let mut e = Self::bare(id, EntityKind::Champion(def.kind), Some(slot), position);
        e.defense = def.defense;
        e.health = Some(HealthComponent::new(def.hp));
        e.attack = Some(AttackComponent::new(
            def.damage,
            def.attack_speed,
            def.attack_range,
            def.gold_mine_damage,
            StrategyKind::Champion,
            clock,
        ));
        e.moving = Some(MovingComponent::new(def.move_speed, clock));
        e.skill = Some(SkillComponent::for_champion(def.kind, clock));
        e
    }

    pub fn troop(
        id: EntityId,
        slot: Slot,
        def: &TroopDef,
        position: Vector2,
        clock: &TickClock,
    ) -> Self {
        let mut e = Self::bare(id, EntityKind::Troop(def.id), Some(slot), position);
        e.defense = def.defense;
        e.detection_range = def.detection_range;
        e.health = Some(HealthComponent::new(def.hp));
        e.attack = Some(AttackComponent::new(
            def.damage,
            def.attack_speed,
            def.attack_range,
            def.gold_mine_damage,
            StrategyKind::Troop,
            clock,
        ));
        e.moving = Some(MovingComponent::new(def.move_speed, clock));
        e
    }

    fn building(
        id: EntityId,
        kind: EntityKind,
        slot: Slot,
        def: &BuildingDef,
        clock: &TickClock,
    ) -> Self {
        let mut e = Self::bare(id, kind, Some(slot), def.position);
        e.footprint = Footprint {
            width: def.width,
            length: def.length,
        };
        e.defense = def.defense;
        e.detection_range = def.attack_range;
        e.health = Some(HealthComponent::new(def.hp));
        if def.damage > 0 && def.attack_speed > 0.0 {
            e.attack = Some(AttackComponent::new(
                def.damage,
                def.attack_speed,
                def.attack_range,
                0,
                StrategyKind::Tower,
                clock,
            ));
        }
        e
    }

    pub fn tower(id: EntityId, slot: Slot, def: &BuildingDef, clock: &TickClock) -> Self {
        Self::building(id, EntityKind::Tower, slot, def, clock)
    }

    pub fn burg(id: EntityId, slot: Slot, def: &BuildingDef, clock: &TickClock) -> Self {
        Self::building(id, EntityKind::Burg, slot, def, clock)
    }

    pub fn gold_mine(
        id: EntityId,
        position: Vector2,
        profile: GoldMineProfile,
        is_small: bool,
    ) -> Self {
        let mut e = Self::bare(id, EntityKind::GoldMine, None, position);
        e.health = Some(HealthComponent::new(profile.hp));
        e.gold_mine = Some(GoldMineComponent {
            capacity: profile.capacity,
            is_small,
        });
        e
    }

    // --- Capability checks ---

    pub fn has_health(&self) -> bool {
        self.health.is_some()
    }

    pub fn has_attack(&self) -> bool {
        self.attack.is_some()
    }

    pub fn has_moving(&self) -> bool {
        self.moving.is_some()
    }

    pub fn has_skill(&self) -> bool {
        self.skill.is_some()
    }

    /// Champions draw on their slot's gold balance.
    pub fn has_gold(&self) -> bool {
        matches!(self.kind, EntityKind::Champion(_))
    }

    pub fn is_alive(&self) -> bool {
        self.health.as_ref().is_some_and(HealthComponent::is_alive)
    }

    pub fn hp(&self) -> (i32, i32) {
        self.health
            .as_ref()
            .map_or((0, 0), |h| (h.current(), h.max()))
    }

    /// Both sides belong to different slots.
    pub fn is_enemy_of(&self, other: &Entity) -> bool {
        matches!((self.owner, other.owner), (Some(a), Some(b)) if a != b)
    }

    pub fn same_slot(&self, other: &Entity) -> bool {
        matches!((self.owner, other.owner), (Some(a), Some(b)) if a == b)
    }

    /// Gap between footprints: `sqrt(dx² + dy²)` with each axis reduced by half of both extents.
    pub fn distance_to(&self, other: &Entity) -> f32 {
        let dx = ((self.position.x - other.position.x).abs()
            - (self.footprint.width + other.footprint.width) / 2.0)
            .max(0.0);
        let dy = ((self.position.y - other.position.y).abs()
            - (self.footprint.length + other.footprint.length) / 2.0)
            .max(0.0);
        dx.hypot(dy)
    }

    // --- Skill restrictions ---

    pub fn skill_forbids_move(&self) -> bool {
        self.skill.as_ref().is_some_and(SkillComponent::blocks_moving)
    }

    pub fn skill_forbids_attack(&self) -> bool {
        self.skill.as_ref().is_some_and(SkillComponent::blocks_attacking)
    }

    // --- Orders ---

    pub fn is_attacking(&self) -> bool {
        self.attack.as_ref().is_some_and(AttackComponent::is_attacking)
    }

    pub fn is_moving(&self) -> bool {
        self.moving.as_ref().is_some_and(MovingComponent::is_moving)
    }

    /// Whether a move order at `tick` would be accepted.
    pub fn accepts_move(&self, forced: bool, tick: i64) -> bool {
        match &self.moving {
            Some(m) => (forced || !self.skill_forbids_move()) && m.can_accept(forced, tick),
            None => false,
        }
    }

    /// Installs a move order. Non-forced orders are refused while a skill forbids moving.
    pub fn set_move_context(&mut self, ctx: Option<MoveContext>, forced: bool, tick: i64) -> bool {
        if ctx.is_some() && !forced && self.skill_forbids_move() {
            tracing::debug!(entity_id = %self.id, "Move refused while skill is active");
            return false;
        }
        match self.moving.as_mut() {
            Some(m) => m.set_move_context(ctx, forced, tick),
            None => false,
        }
    }

    pub fn stop_moving(&mut self) {
        if let Some(m) = self.moving.as_mut() {
            m.stop();
        }
    }

    /// Installs or clears the attack order. Refused while a skill forbids attacking.
    pub fn set_attack_context(&mut self, ctx: Option<AttackContext>) -> bool {
        if ctx.is_some() && self.skill_forbids_attack() {
            tracing::debug!(entity_id = %self.id, "Attack refused while skill is active");
            return false;
        }
        match self.attack.as_mut() {
            Some(a) => {
                a.set_context(ctx);
                true
            }
            None => false,
        }
    }

    pub fn stop_attacking(&mut self) {
        if let Some(a) = self.attack.as_mut() {
            a.set_context(None);
        }
    }

    pub fn attack_target(&self) -> Option<&EntityId> {
        self.attack.as_ref().and_then(AttackComponent::target_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::GameData;

    fn champion_at(id: &str, slot: Slot, x: f32, y: f32) -> Entity {
        let data = GameData::builtin();
        let def = data.champion(ChampionKind::MeleeAxe).unwrap();
        Entity::champion(id.into(), slot, def, Vector2::new(x, y), &TickClock::default())
    }

    #[test]
    fn test_champion_has_all_components() {
        let c = champion_at("champion_0", 0, 1.0, 1.0);
        assert!(c.has_health() && c.has_attack() && c.has_moving() && c.has_skill() && c.has_gold());
        assert!(c.is_alive());
    }

    #[test]
    fn test_gold_mine_is_neutral_health_only() {
        let mine = Entity::gold_mine(
            "gold_mine_1".into(),
            Vector2::new(3.0, 3.0),
            GoldMineProfile { capacity: 50, hp: 200 },
            true,
        );
        assert!(mine.has_health());
        assert!(!mine.has_attack() && !mine.has_moving() && !mine.has_skill());
        assert_eq!(mine.owner, None);
    }

    #[test]
    fn test_unit_distance_is_euclidean() {
        let a = champion_at("a", 0, 0.0, 0.0);
        let b = champion_at("b", 1, 3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
        assert!(a.is_enemy_of(&b));
        assert!(!a.same_slot(&b));
    }

    #[test]
    fn test_building_distance_uses_footprint() {
        let clock = TickClock::default();
        let def = BuildingDef {
            position: Vector2::new(10.0, 10.0),
            width: 4.0,
            length: 2.0,
            hp: 100,
            defense: 0,
            damage: 0,
            attack_speed: 0.0,
            attack_range: 0.0,
        };
        let burg = Entity::burg("burg_1".into(), 1, &def, &clock);
        assert!(!burg.has_attack());
        // 3 units right of the edge (x edge at 12)
        let c = champion_at("c", 0, 15.0, 10.0);
        assert!((c.distance_to(&burg) - 3.0).abs() < 1e-6);
        // inside the footprint
        let d = champion_at("d", 0, 11.0, 10.5);
        assert_eq!(d.distance_to(&burg), 0.0);
    }

    #[test]
    fn test_neutral_is_never_enemy() {
        let a = champion_at("a", 0, 0.0, 0.0);
        let mine = Entity::gold_mine(
            "gold_mine_1".into(),
            Vector2::ZERO,
            GoldMineProfile { capacity: 1, hp: 1 },
            true,
        );
        assert!(!a.is_enemy_of(&mine));
        assert!(!a.same_slot(&mine));
    }
}
