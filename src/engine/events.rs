// Events produced by a match tick, drained by the match worker and sent to clients.

use serde::Serialize;

use super::catalog::Slot;
use super::entity::EntityId;
use super::geometry::Vector2;

/// Who should receive an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection bound to the match.
    Match,
    /// Only the player seated in this slot.
    Slot(Slot),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEvent {
    PositionChanged {
        id: EntityId,
        position: Vector2,
        speed: f32,
    },
    AttackAnimation {
        attacker: EntityId,
        target: EntityId,
        attack_speed: f32,
    },
    HealthChanged {
        target: EntityId,
        current: i32,
        max: i32,
        damage: i32,
    },
    EntityDied {
        id: EntityId,
    },
    EntitiesRemoved {
        ids: Vec<EntityId>,
    },
    SkillCast {
        caster: EntityId,
        aim: Vector2,
        skill_length: f32,
    },
    GoldChanged {
        slot: Slot,
        gold: i32,
    },
    PlaygroundChanged {
        slot: Slot,
        inside: bool,
    },
    GoldMineSpawned {
        id: EntityId,
        position: Vector2,
        is_small: bool,
        hp: i32,
    },
    RespawnScheduled {
        slot: Slot,
        seconds: i16,
    },
    ChampionRespawned {
        slot: Slot,
        id: EntityId,
        position: Vector2,
        hp: i32,
    },
    TroopSpawned {
        id: EntityId,
        troop_id: i16,
        slot: Slot,
        position: Vector2,
        hp: i32,
    },
    SlotEliminated {
        slot: Slot,
    },
    GameOver {
        winner: Slot,
    },
}

impl GameEvent {
    pub fn audience(&self) -> Audience {
        match self {
            GameEvent::GoldChanged { slot, .. } | GameEvent::RespawnScheduled { slot, .. } => {
                Audience::Slot(*slot)
            }
            _ => Audience::Match,
        }
    }
}

/// An event stamped with the tick that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickEvent {
    pub tick: i64,
    pub event: GameEvent,
}
