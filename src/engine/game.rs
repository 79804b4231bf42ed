// Match state and the fixed-order tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::catalog::{ChampionKind, GameData, GameMap, Slot};
use super::config::*;
use super::entity::{Entity, EntityId, EntityKind};
use super::events::{GameEvent, TickEvent};
use super::geometry::Vector2;
use super::movement::MoveContext;
use super::pathfinder;
use super::slot::SlotState;
use crate::error::{SetupError, ValidationError};
use crate::metrics;

/// One seat in a match request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeat {
    pub slot: Slot,
    #[serde(default)]
    pub user_id: Option<String>,
    pub champion: ChampionKind,
}

/// Everything needed to create a match once champion selection is done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSetup {
    #[serde(default)]
    pub match_id: Option<String>,
    pub map_id: String,
    pub players: Vec<PlayerSeat>,
}

/// Entity row of the initial state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: u8,
    pub slot: Slot,
    pub position: Vector2,
    pub hp: i32,
    pub max_hp: i32,
}

/// Tick timing data for observability and budget monitoring.
#[derive(Clone, Debug, Default)]
pub struct TickTimings {
    /// Total tick duration in microseconds.
    pub total_us: u64,
    /// Time spent moving entities in microseconds.
    pub movement_us: u64,
    /// Time spent in targeting and attacks in microseconds.
    pub combat_us: u64,
}

/// Authoritative state of one match. Owned by a single match worker.
pub struct Game {
    pub match_id: String,
    pub clock: TickClock,
    pub map: Arc<GameMap>,
    data: Arc<GameData>,
    pub tick: i64,
    pub entities: BTreeMap<EntityId, Entity>,
    pub slots: BTreeMap<Slot, SlotState>,
    events: Vec<TickEvent>,
    pub(crate) rng: StdRng,
    pub(crate) next_gold_mine_tick: i64,
    pub(crate) live_gold_mines: usize,
    pub(crate) gold_mine_seq: u32,
    winner: Option<Slot>,
    /// Timing data from the last tick.
    pub last_tick_timings: TickTimings,
}

impl Game {
    /// Validates the whole setup before building anything.
    pub fn new(
        match_id: String,
        setup: &MatchSetup,
        data: Arc<GameData>,
        clock: TickClock,
        seed: Option<u64>,
    ) -> Result<Self, SetupError> {
        let map = data.map(&setup.map_id)?;
        if setup.players.is_empty() {
            return Err(SetupError::InvalidMap(format!(
                "match '{match_id}' has no players"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for seat in &setup.players {
            if !seen.insert(seat.slot) {
                return Err(SetupError::DuplicateSlot(seat.slot));
            }
            if map.slot_info(seat.slot).is_none() {
                return Err(SetupError::UnknownSlot {
                    map: map.id.clone(),
                    slot: seat.slot,
                });
            }
            data.champion(seat.champion)?;
        }

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let next_gold_mine_tick = clock.seconds_to_ticks(map.gold_mines.interval_seconds);

        let mut game = Game {
            match_id,
            clock,
            map: map.clone(),
            data: data.clone(),
            tick: 0,
            entities: BTreeMap::new(),
            slots: BTreeMap::new(),
            events: Vec::new(),
            rng,
            next_gold_mine_tick,
            live_gold_mines: 0,
            gold_mine_seq: 0,
            winner: None,
            last_tick_timings: TickTimings::default(),
        };

        for seat in &setup.players {
            let Some(info) = map.slot_info(seat.slot) else {
                continue;
            };
            let mut state = SlotState::new(
                seat.slot,
                seat.user_id.clone(),
                seat.champion,
                info.starting_gold,
            );

            let def = data.champion(seat.champion)?;
            let champion_id = EntityId(format!("champion_{}", seat.slot));
            game.insert_entity(Entity::champion(
                champion_id.clone(),
                seat.slot,
                def,
                info.champion_spawn,
                &clock,
            ));
            state.champion = Some(champion_id);

            let burg_id = EntityId(format!("burg_{}", seat.slot));
            game.insert_entity(Entity::burg(burg_id.clone(), seat.slot, &info.burg, &clock));
            state.burg = Some(burg_id);

            for (n, tower) in info.towers.iter().enumerate() {
                let tower_id = EntityId(format!("tower_{}_{}", seat.slot, n));
                game.insert_entity(Entity::tower(tower_id.clone(), seat.slot, tower, &clock));
                state.towers.insert(tower_id);
            }

            game.slots.insert(seat.slot, state);
        }

        tracing::info!(
            match_id = %game.match_id,
            map_id = %map.id,
            players = setup.players.len(),
            entities = game.entities.len(),
            "Match state created"
        );
        Ok(game)
    }

    pub(crate) fn insert_entity(&mut self, entity: Entity) {
        metrics::ENTITIES_SPAWNED_TOTAL
            .with_label_values(&[entity.kind.label()])
            .inc();
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    // --- Events ---

    pub(crate) fn emit(&mut self, event: GameEvent) {
        self.events.push(TickEvent {
            tick: self.tick,
            event,
        });
    }

    /// Takes all events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<TickEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Queries ---

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub(crate) fn pair(&self, a: &EntityId, b: &EntityId) -> Option<(&Entity, &Entity)> {
        Some((self.entities.get(a)?, self.entities.get(b)?))
    }

    pub fn slot(&self, slot: Slot) -> Option<&SlotState> {
        self.slots.get(&slot)
    }

    pub fn slot_mut(&mut self, slot: Slot) -> Option<&mut SlotState> {
        self.slots.get_mut(&slot)
    }

    pub fn champion_of(&self, slot: Slot) -> Option<&EntityId> {
        self.slots.get(&slot).and_then(|s| s.champion.as_ref())
    }

    /// Gold balance behind an entity's gold capability.
    pub fn gold_of(&self, id: &EntityId) -> Option<i32> {
        let e = self.entities.get(id)?;
        if !e.has_gold() {
            return None;
        }
        self.slots.get(&e.owner?).map(|s| s.gold.current())
    }

    pub fn winner(&self) -> Option<Slot> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// True once every seat that ever connected has disconnected again.
    pub fn all_players_left(&self) -> bool {
        let mut any = false;
        for s in self.slots.values() {
            if s.connected {
                return false;
            }
            any |= s.ever_connected;
        }
        any
    }

    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        self.entities
            .values()
            .map(|e| {
                let (hp, max_hp) = e.hp();
                EntitySnapshot {
                    id: e.id.clone(),
                    kind: e.kind.code(),
                    slot: e.owner.unwrap_or(NO_SLOT),
                    position: e.position,
                    hp,
                    max_hp,
                }
            })
            .collect()
    }

    // --- Movement ---

    /// Paths `id` toward `goal` and installs the order. Targets outside the map
    /// are pulled onto the nearest cell center.
    pub fn issue_move(&mut self, id: &EntityId, goal: Vector2, forced: bool) -> bool {
        let tick = self.tick;
        let Some(entity) = self.entities.get(id) else {
            return false;
        };
        if !entity.accepts_move(forced, tick) {
            return false;
        }
        let grid = &self.map.grid;
        let goal = if grid.contains_position(goal) {
            goal
        } else {
            grid.to_position(grid.to_grid_cell(goal))
        };
        let path = pathfinder::find_path(grid, grid.to_grid_cell(entity.position), grid.to_grid_cell(goal));
        let Some(ctx) = MoveContext::new(goal, path, grid, tick) else {
            return false;
        };
        self.entities
            .get_mut(id)
            .is_some_and(|e| e.set_move_context(Some(ctx), forced, tick))
    }

    fn perform_moves(&mut self) {
        let movers: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_moving())
            .map(|e| e.id.clone())
            .collect();

        for id in movers {
            let Some(entity) = self.entities.get(&id) else {
                continue;
            };
            let in_range = match (entity.attack.as_ref(), entity.attack_target()) {
                (Some(atk), Some(target)) => self
                    .entities
                    .get(target)
                    .is_some_and(|t| entity.distance_to(t) <= atk.range),
                _ => false,
            };
            if in_range {
                continue;
            }
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            let from = entity.position;
            let Some(moving) = entity.moving.as_mut() else {
                continue;
            };
            if let Some(pos) = moving.step(from) {
                let speed = moving.speed;
                entity.position = pos;
                self.emit(GameEvent::PositionChanged {
                    id,
                    position: pos,
                    speed,
                });
            }
        }
    }

    // --- Damage & death ---

    /// Applies `amount` to the target's health and runs the death pass on the killing blow.
    pub(crate) fn apply_damage(
        &mut self,
        target_id: &EntityId,
        amount: i32,
        killer: Option<&EntityId>,
    ) -> bool {
        let Some(health) = self
            .entities
            .get_mut(target_id)
            .and_then(|e| e.health.as_mut())
        else {
            return false;
        };
        if !health.is_alive() {
            return false;
        }
        let died = health.take_damage(amount);
        let (current, max) = (health.current(), health.max());
        self.emit(GameEvent::HealthChanged {
            target: target_id.clone(),
            current,
            max,
            damage: amount,
        });
        if died {
            self.handle_death(target_id, killer);
        }
        died
    }

    fn credit_gold(&mut self, slot: Slot, amount: i32) {
        if let Some(state) = self.slots.get_mut(&slot) {
            state.gold.increase_gold(amount);
            let gold = state.gold.current();
            self.emit(GameEvent::GoldChanged { slot, gold });
        }
    }

    fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        self.stop_attackers_of(id);
        self.entities.remove(id)
    }

    fn handle_death(&mut self, target_id: &EntityId, killer: Option<&EntityId>) {
        let Some(target) = self.entities.get(target_id) else {
            return;
        };
        let (kind, owner) = (target.kind, target.owner);
        let killer_slot = killer
            .and_then(|k| self.entities.get(k))
            .and_then(|k| k.owner);

        metrics::ENTITIES_KILLED_TOTAL
            .with_label_values(&[kind.label()])
            .inc();
        tracing::debug!(
            match_id = %self.match_id,
            entity_id = %target_id,
            killer = ?killer.map(|k| k.as_str()),
            tick = self.tick,
            "Entity destroyed"
        );

        match kind {
            EntityKind::Champion(_) => self.champion_died(target_id, owner, killer_slot),
            EntityKind::Troop(_) | EntityKind::Tower => {
                self.emit(GameEvent::EntityDied {
                    id: target_id.clone(),
                });
                self.remove_entity(target_id);
                if let Some(state) = owner.and_then(|s| self.slots.get_mut(&s)) {
                    state.towers.remove(target_id);
                }
            }
            EntityKind::Burg => {
                if let Some(slot) = owner {
                    self.eliminate_slot(slot, target_id);
                }
            }
            EntityKind::GoldMine => {
                let capacity = target.gold_mine.map_or(0, |g| g.capacity);
                if let Some(slot) = killer_slot {
                    self.credit_gold(slot, capacity);
                }
                self.emit(GameEvent::EntityDied {
                    id: target_id.clone(),
                });
                self.remove_entity(target_id);
                self.live_gold_mines = self.live_gold_mines.saturating_sub(1);
            }
        }
    }

    fn champion_died(&mut self, id: &EntityId, owner: Option<Slot>, killer_slot: Option<Slot>) {
        if let (Some(victim), Some(killer)) = (owner, killer_slot) {
            if victim != killer {
                let stolen = self.slots.get_mut(&victim).map_or(0, |s| {
                    let amount =
                        (s.gold.current() as f64 * CHAMPION_KILL_GOLD_STEAL).round() as i32;
                    s.gold.decrease_gold(amount)
                });
                if stolen > 0 {
                    let gold = self.slots.get(&victim).map_or(0, |s| s.gold.current());
                    self.emit(GameEvent::GoldChanged { slot: victim, gold });
                    self.credit_gold(killer, stolen);
                }
            }
        }

        self.emit(GameEvent::EntityDied { id: id.clone() });
        let removed = self.remove_entity(id);

        let Some(slot) = owner else {
            return;
        };
        let respawn_ticks = self.clock.seconds_to_ticks(self.map.champion_respawn_seconds);
        let seconds = self.map.champion_respawn_seconds.round() as i16;
        let tick = self.tick;
        if let Some(state) = self.slots.get_mut(&slot) {
            state.champion = None;
            state.in_playground = false;
            state.stashed_skill = removed.and_then(|e| e.skill);
            if !state.eliminated {
                state.respawn_at = Some(tick + respawn_ticks);
                self.emit(GameEvent::RespawnScheduled { slot, seconds });
            }
        }
    }

    fn eliminate_slot(&mut self, slot: Slot, burg_id: &EntityId) {
        self.emit(GameEvent::EntityDied {
            id: burg_id.clone(),
        });

        let owned: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.owner == Some(slot))
            .map(|e| e.id.clone())
            .collect();
        for id in &owned {
            self.remove_entity(id);
        }
        self.emit(GameEvent::EntitiesRemoved { ids: owned });

        if let Some(state) = self.slots.get_mut(&slot) {
            state.eliminated = true;
            state.champion = None;
            state.burg = None;
            state.towers.clear();
            state.respawn_at = None;
        }
        self.emit(GameEvent::SlotEliminated { slot });
        tracing::info!(match_id = %self.match_id, slot, tick = self.tick, "Slot eliminated");

        let remaining: Vec<Slot> = self
            .slots
            .values()
            .filter(|s| !s.eliminated)
            .map(|s| s.slot)
            .collect();
        if let [winner] = *remaining.as_slice() {
            if self.winner.is_none() {
                self.winner = Some(winner);
                self.emit(GameEvent::GameOver { winner });
                tracing::info!(match_id = %self.match_id, winner, tick = self.tick, "Game over");
            }
        }
    }

    fn process_respawns(&mut self) {
        let tick = self.tick;
        let due: Vec<Slot> = self
            .slots
            .values()
            .filter(|s| !s.eliminated && s.respawn_at.is_some_and(|t| tick >= t))
            .map(|s| s.slot)
            .collect();

        for slot in due {
            let Some(info) = self.map.slot_info(slot) else {
                continue;
            };
            let spawn = info.champion_spawn;
            let Some(state) = self.slots.get_mut(&slot) else {
                continue;
            };
            state.respawn_at = None;
            let kind = state.champion_kind;
            let stashed = state.stashed_skill.take();
            let Ok(def) = self.data.champion(kind) else {
                continue;
            };
            let id = EntityId(format!("champion_{slot}"));
            let mut champion = Entity::champion(id.clone(), slot, def, spawn, &self.clock);
            if let Some(mut skill) = stashed {
                skill.active = false;
                skill.window = None;
                skill.cast = None;
                skill.projectile = None;
                champion.skill = Some(skill);
            }
            let hp = champion.hp().0;
            self.insert_entity(champion);
            if let Some(state) = self.slots.get_mut(&slot) {
                state.champion = Some(id.clone());
            }
            self.emit(GameEvent::ChampionRespawned {
                slot,
                id,
                position: spawn,
                hp,
            });
        }
    }

    // --- Autonomous behaviour ---

    fn nearest_target(&self, hunter: &Entity, radius: f32) -> Option<EntityId> {
        let strategy = hunter.attack.as_ref()?.strategy.strategy();
        self.entities
            .values()
            .filter(|t| t.owner.is_some() && strategy.can_target(hunter, t))
            .map(|t| (hunter.distance_to(t), t))
            .filter(|(d, _)| *d <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, t)| t.id.clone())
    }

    fn nearest_enemy_burg(&self, hunter: &Entity) -> Option<Vector2> {
        self.entities
            .values()
            .filter(|e| matches!(e.kind, EntityKind::Burg) && hunter.is_enemy_of(e))
            .min_by(|a, b| {
                hunter
                    .position
                    .distance(a.position)
                    .total_cmp(&hunter.position.distance(b.position))
            })
            .map(|e| e.position)
    }

    /// Troops and structures pick their own targets; champions only act on orders.
    fn run_targeting(&mut self) {
        let hunters: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.has_attack() && !matches!(e.kind, EntityKind::Champion(_)))
            .map(|e| e.id.clone())
            .collect();

        for id in hunters {
            let Some(hunter) = self.entities.get(&id) else {
                continue;
            };
            let Some(range) = hunter.attack.as_ref().map(|a| a.range) else {
                continue;
            };
            match hunter.kind {
                EntityKind::Troop(_) => {
                    if hunter.is_attacking() {
                        continue;
                    }
                    if let Some(target) = self.nearest_target(hunter, hunter.detection_range.max(range)) {
                        self.begin_attack(&id, &target);
                    } else if !hunter.is_moving() {
                        if let Some(goal) = self.nearest_enemy_burg(hunter) {
                            self.issue_move(&id, goal, false);
                        }
                    }
                }
                EntityKind::Tower | EntityKind::Burg => {
                    let current = hunter
                        .attack_target()
                        .and_then(|t| self.entities.get(t))
                        .filter(|t| t.is_alive() && hunter.distance_to(t) <= range)
                        .map(|t| t.id.clone());
                    if current.is_some() {
                        continue;
                    }
                    let next = self.nearest_target(hunter, range);
                    match next {
                        Some(target) => {
                            self.begin_attack(&id, &target);
                        }
                        None => self.stop_attack(&id),
                    }
                }
                _ => {}
            }
        }
    }

    fn run_attacks(&mut self) {
        let attackers: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.is_attacking())
            .map(|e| e.id.clone())
            .collect();
        for id in attackers {
            if self.is_over() {
                break;
            }
            self.perform_attack(&id);
        }
    }

    // --- Tick ---

    /// Advances the match by one tick.
    pub fn tick(&mut self) {
        if self.is_over() {
            return;
        }
        let tick_start = Instant::now();
        self.tick += 1;

        self.process_respawns();
        self.update_skills();

        let move_start = Instant::now();
        self.perform_moves();
        let movement_us = move_start.elapsed().as_micros() as u64;

        let combat_start = Instant::now();
        self.run_targeting();
        self.run_attacks();
        let combat_us = combat_start.elapsed().as_micros() as u64;

        if !self.is_over() {
            self.update_income();
            self.update_gold_mines();
        }

        let total_us = tick_start.elapsed().as_micros() as u64;
        self.last_tick_timings = TickTimings {
            total_us,
            movement_us,
            combat_us,
        };

        let budget_us = self.clock.interval_ms() * 1000;
        if total_us > budget_us {
            tracing::warn!(
                match_id = %self.match_id,
                tick = self.tick,
                total_us,
                movement_us,
                combat_us,
                budget_us,
                "Tick exceeded budget"
            );
        }
    }

    // --- Player orders ---

    fn owned_champion(&self, slot: Slot) -> Option<EntityId> {
        let id = self.champion_of(slot)?;
        self.entities
            .get(id)
            .filter(|e| e.is_alive())
            .map(|e| e.id.clone())
    }

    /// Moves the slot's champion. An accepted move cancels its attack order.
    pub fn order_move(&mut self, slot: Slot, target: Vector2) -> bool {
        let Some(id) = self.owned_champion(slot) else {
            return false;
        };
        let accepted = self.issue_move(&id, target, false);
        if accepted {
            self.stop_attack(&id);
        }
        accepted
    }

    /// Orders one of the slot's entities to attack a target.
    pub fn order_attack(
        &mut self,
        slot: Slot,
        attacker: &EntityId,
        target: &EntityId,
    ) -> Result<bool, ValidationError> {
        let entity = self
            .entities
            .get(attacker)
            .ok_or_else(|| ValidationError::UnknownEntity(attacker.to_string()))?;
        if entity.owner != Some(slot) {
            return Err(ValidationError::NotOwner {
                entity_id: attacker.to_string(),
                slot,
            });
        }
        if !self.entities.contains_key(target) {
            return Err(ValidationError::UnknownEntity(target.to_string()));
        }
        Ok(self.begin_attack(attacker, target))
    }

    pub fn order_stop_attack(&mut self, slot: Slot) -> bool {
        match self.owned_champion(slot) {
            Some(id) => {
                self.stop_attack(&id);
                true
            }
            None => false,
        }
    }

    pub fn order_skill(&mut self, slot: Slot, aim: Vector2) -> bool {
        match self.owned_champion(slot) {
            Some(id) => self.use_skill(&id, aim),
            None => false,
        }
    }

    pub fn order_troop(&mut self, slot: Slot, troop_id: i16) -> Result<bool, ValidationError> {
        let def = self
            .data
            .troop(troop_id)
            .cloned()
            .ok_or(ValidationError::UnknownTroop(troop_id))?;
        Ok(self.spawn_troop(slot, &def))
    }

    pub fn set_connected(&mut self, slot: Slot, connected: bool) {
        if let Some(state) = self.slots.get_mut(&slot) {
            state.mark_connected(connected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn duel() -> Game {
        let setup = MatchSetup {
            match_id: None,
            map_id: "arena".into(),
            players: vec![
                PlayerSeat {
                    slot: 0,
                    user_id: Some("alice".into()),
                    champion: ChampionKind::MeleeAxe,
                },
                PlayerSeat {
                    slot: 1,
                    user_id: Some("bob".into()),
                    champion: ChampionKind::MarksmanCrossbow,
                },
            ],
        };
        Game::new(
            "m1".into(),
            &setup,
            Arc::new(GameData::builtin()),
            TickClock::default(),
            Some(7),
        )
        .unwrap()
    }

    #[test]
    fn test_setup_spawns_slot_entities() {
        let game = duel();
        assert_eq!(game.slots.len(), 2);
        for slot in [0, 1] {
            let state = game.slot(slot).unwrap();
            assert!(state.champion.is_some());
            assert!(state.burg.is_some());
            assert_eq!(state.towers.len(), 2);
            assert_eq!(state.gold.current(), 100);
        }
        // 2 x (champion + burg + 2 towers)
        assert_eq!(game.entities.len(), 8);
        assert_eq!(game.snapshot().len(), 8);
    }

    #[test]
    fn test_setup_rejects_unknown_map_and_slot() {
        let data = Arc::new(GameData::builtin());
        let mut setup = MatchSetup {
            match_id: None,
            map_id: "missing".into(),
            players: vec![PlayerSeat {
                slot: 0,
                user_id: None,
                champion: ChampionKind::MageScepter,
            }],
        };
        let err = Game::new("x".into(), &setup, data.clone(), TickClock::default(), None);
        assert!(matches!(err, Err(SetupError::UnknownMap(_))));

        setup.map_id = "arena".into();
        setup.players[0].slot = 5;
        let err = Game::new("x".into(), &setup, data.clone(), TickClock::default(), None);
        assert!(matches!(err, Err(SetupError::UnknownSlot { slot: 5, .. })));

        setup.players = vec![setup.players[0].clone(), setup.players[0].clone()];
        setup.players[0].slot = 0;
        setup.players[1].slot = 0;
        let err = Game::new("x".into(), &setup, data, TickClock::default(), None);
        assert!(matches!(err, Err(SetupError::DuplicateSlot(0))));
    }

    #[test]
    fn test_gold_capability_delegates_to_slot() {
        let game = duel();
        let champ = game.champion_of(0).unwrap().clone();
        assert_eq!(game.gold_of(&champ), Some(100));
        let burg = game.slot(0).unwrap().burg.clone().unwrap();
        assert_eq!(game.gold_of(&burg), None);
    }

    #[test]
    fn test_order_move_walks_champion() {
        let mut game = duel();
        let champ = game.champion_of(0).unwrap().clone();
        let start = game.entity(&champ).unwrap().position;
        assert!(game.order_move(0, Vector2::new(8.5, 12.5)));
        game.tick();
        let pos = game.entity(&champ).unwrap().position;
        assert!(pos.y > start.y);
        let events = game.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(&e.event, GameEvent::PositionChanged { id, .. } if *id == champ)));
    }

    #[test]
    fn test_order_attack_validates_ownership() {
        let mut game = duel();
        let theirs = game.champion_of(1).unwrap().clone();
        let mine = game.champion_of(0).unwrap().clone();
        assert!(matches!(
            game.order_attack(0, &theirs, &mine),
            Err(ValidationError::NotOwner { .. })
        ));
        assert!(matches!(
            game.order_attack(0, &EntityId::from("ghost"), &mine),
            Err(ValidationError::UnknownEntity(_))
        ));
        assert_eq!(game.order_attack(0, &mine, &theirs), Ok(true));
    }

    #[test]
    fn test_all_players_left() {
        let mut game = duel();
        assert!(!game.all_players_left());
        game.set_connected(0, true);
        assert!(!game.all_players_left());
        game.set_connected(0, false);
        assert!(game.all_players_left());
    }

    #[test]
    fn test_burg_destruction_ends_match() {
        let mut game = duel();
        let burg = game.slot(1).unwrap().burg.clone().unwrap();
        let attacker = game.champion_of(0).unwrap().clone();
        assert!(game.apply_damage(&burg, 100_000, Some(&attacker)));

        assert!(game.slot(1).unwrap().eliminated);
        assert_eq!(game.winner(), Some(0));
        assert!(game.entities.values().all(|e| e.owner != Some(1)));

        let events: Vec<GameEvent> = game.drain_events().into_iter().map(|e| e.event).collect();
        assert!(events.contains(&GameEvent::SlotEliminated { slot: 1 }));
        assert!(events.contains(&GameEvent::GameOver { winner: 0 }));
        let removed = events
            .iter()
            .find_map(|e| match e {
                GameEvent::EntitiesRemoved { ids } => Some(ids.len()),
                _ => None,
            })
            .unwrap();
        assert_eq!(removed, 4);

        // ticks after game over are inert
        let tick = game.tick;
        game.tick();
        assert_eq!(game.tick, tick);
    }

    #[test]
    fn test_champion_death_steals_gold_and_respawns() {
        let mut game = duel();
        let killer = game.champion_of(0).unwrap().clone();
        let victim = game.champion_of(1).unwrap().clone();
        assert!(game.apply_damage(&victim, 100_000, Some(&killer)));

        assert_eq!(game.slot(1).unwrap().gold.current(), 70);
        assert_eq!(game.slot(0).unwrap().gold.current(), 130);
        assert!(game.entity(&victim).is_none());
        let respawn_at = game.slot(1).unwrap().respawn_at.unwrap();
        assert_eq!(respawn_at, game.clock.seconds_to_ticks(10.0));

        while game.tick < respawn_at {
            game.tick();
        }
        let champ = game.entity(&victim).unwrap();
        assert_eq!(champ.hp().0, champ.hp().1);
        let events: Vec<GameEvent> = game.drain_events().into_iter().map(|e| e.event).collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::ChampionRespawned { slot: 1, .. })));
        assert!(events.contains(&GameEvent::RespawnScheduled { slot: 1, seconds: 10 }));
    }
}
