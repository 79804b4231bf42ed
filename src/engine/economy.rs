// Passive income, gold mine spawning and troop purchases.

use rand::Rng;

use super::catalog::{Slot, TroopDef};
use super::config::GOLD_MINE_SPAWN_ATTEMPTS;
use super::entity::{Entity, EntityId};
use super::events::GameEvent;
use super::game::Game;
use super::geometry::Vector2;
use super::pathfinder;

impl Game {
    /// Recomputes playground presence and credits income to slots whose champion stands in it.
    pub(crate) fn update_income(&mut self) {
        let per_tick = self.map.gold_per_second * self.clock.interval_ms() as f64 / 1000.0;
        let playground = self.map.playground;

        let slots: Vec<(Slot, bool)> = self
            .slots
            .values()
            .filter(|s| s.is_active())
            .filter_map(|s| {
                let champion = self.entities.get(s.champion.as_ref()?)?;
                champion
                    .is_alive()
                    .then(|| (s.slot, playground.contains(champion.position)))
            })
            .collect();

        for (slot, inside) in slots {
            let Some(state) = self.slots.get_mut(&slot) else {
                continue;
            };
            let changed = state.in_playground != inside;
            state.in_playground = inside;
            let credited = if inside { state.accrue_income(per_tick) } else { 0 };
            let gold = state.gold.current();

            if changed {
                self.emit(GameEvent::PlaygroundChanged { slot, inside });
            }
            if credited > 0 {
                self.emit(GameEvent::GoldChanged { slot, gold });
            }
        }
    }

    pub(crate) fn update_gold_mines(&mut self) {
        if self.tick < self.next_gold_mine_tick {
            return;
        }
        let rules = self.map.gold_mines.clone();
        self.next_gold_mine_tick = self.tick + self.clock.seconds_to_ticks(rules.interval_seconds).max(1);
        if self.live_gold_mines >= rules.max_mines {
            return;
        }

        let is_small = self.rng.gen_bool(0.5);
        let profile = if is_small { rules.small } else { rules.large };
        let Some(position) = self.pick_gold_mine_position() else {
            tracing::warn!(match_id = %self.match_id, tick = self.tick, "No walkable cell for gold mine");
            return;
        };

        let id = EntityId(format!("gold_mine_{}", self.gold_mine_seq));
        self.gold_mine_seq += 1;
        self.live_gold_mines += 1;
        self.insert_entity(Entity::gold_mine(id.clone(), position, profile, is_small));
        self.emit(GameEvent::GoldMineSpawned {
            id,
            position,
            is_small,
            hp: profile.hp,
        });
    }

    fn pick_gold_mine_position(&mut self) -> Option<Vector2> {
        let area = self.map.playground;
        let (half_x, half_y) = (area.length / 2.0, area.width / 2.0);
        let mut last = area.center;
        for _ in 0..GOLD_MINE_SPAWN_ATTEMPTS {
            let candidate = Vector2::new(
                self.rng.gen_range(area.center.x - half_x..=area.center.x + half_x),
                self.rng.gen_range(area.center.y - half_y..=area.center.y + half_y),
            );
            if self.map.grid.is_walkable_position(candidate) && !self.occupied(candidate) {
                return Some(candidate);
            }
            last = candidate;
        }
        let grid = &self.map.grid;
        pathfinder::find_closest_walkable(grid, grid.to_grid_cell(last)).map(|c| grid.to_position(c))
    }

    fn occupied(&self, position: Vector2) -> bool {
        self.entities
            .values()
            .any(|e| e.gold_mine.is_some() && e.position.distance(position) < 1.0)
    }

    /// Buys and spawns a troop for `slot`. Returns false when the slot cannot afford it.
    pub(crate) fn spawn_troop(&mut self, slot: Slot, def: &TroopDef) -> bool {
        let Some(spawn) = self.map.slot_info(slot).map(|i| i.troop_spawn) else {
            return false;
        };
        let Some(state) = self.slots.get_mut(&slot) else {
            return false;
        };
        if !state.is_active() || !state.gold.spend_gold(def.cost) {
            return false;
        }
        let n = state.troops_spawned;
        state.troops_spawned += 1;
        let gold = state.gold.current();

        let id = EntityId(format!("troop_{slot}_{n}"));
        let troop = Entity::troop(id.clone(), slot, def, spawn, &self.clock);
        let hp = troop.hp().0;
        self.insert_entity(troop);
        self.emit(GameEvent::GoldChanged { slot, gold });
        self.emit(GameEvent::TroopSpawned {
            id,
            troop_id: def.id,
            slot,
            position: spawn,
            hp,
        });
        true
    }
}
