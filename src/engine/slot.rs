// Per-player economic and ownership record.

use std::collections::BTreeSet;

use super::catalog::{ChampionKind, Slot};
use super::entity::EntityId;
use super::gold::GoldComponent;
use super::skill::SkillComponent;

#[derive(Debug, Clone)]
pub struct SlotState {
    pub slot: Slot,
    /// Player seated here, if any. Unseated slots are still simulated.
    pub user_id: Option<String>,
    pub champion_kind: ChampionKind,
    pub champion: Option<EntityId>,
    pub gold: GoldComponent,
    /// Fractional income not yet credited.
    pub gold_carry: f64,
    pub towers: BTreeSet<EntityId>,
    pub burg: Option<EntityId>,
    pub eliminated: bool,
    pub in_playground: bool,
    pub respawn_at: Option<i64>,
    /// Skill state kept across a champion's death so cooldowns survive respawn.
    pub stashed_skill: Option<SkillComponent>,
    pub connected: bool,
    pub ever_connected: bool,
    pub troops_spawned: u32,
}

impl SlotState {
    pub fn new(slot: Slot, user_id: Option<String>, champion_kind: ChampionKind, gold: i32) -> Self {
        Self {
            slot,
            user_id,
            champion_kind,
            champion: None,
            gold: GoldComponent::new(gold),
            gold_carry: 0.0,
            towers: BTreeSet::new(),
            burg: None,
            eliminated: false,
            in_playground: false,
            respawn_at: None,
            stashed_skill: None,
            connected: false,
            ever_connected: false,
            troops_spawned: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    /// Accrues fractional income and returns the whole gold credited.
    pub fn accrue_income(&mut self, amount: f64) -> i32 {
        if amount <= 0.0 {
            return 0;
        }
        self.gold_carry += amount;
        let whole = (self.gold_carry + 1e-9).floor();
        if whole < 1.0 {
            return 0;
        }
        self.gold_carry = (self.gold_carry - whole).max(0.0);
        let whole = whole as i32;
        self.gold.increase_gold(whole);
        whole
    }

    pub fn mark_connected(&mut self, connected: bool) {
        self.connected = connected;
        if connected {
            self.ever_connected = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_carries_fraction() {
        let mut s = SlotState::new(0, None, ChampionKind::MeleeAxe, 0);
        // 2 gold/s at 50ms ticks
        let per_tick = 2.0 * 50.0 / 1000.0;
        let mut credited = 0;
        for i in 0..20 {
            credited += s.accrue_income(per_tick);
            if i == 8 {
                assert_eq!(credited, 0);
            }
        }
        assert_eq!(credited, 2);
        assert_eq!(s.gold.current(), 2);
    }

    #[test]
    fn test_connection_tracking() {
        let mut s = SlotState::new(1, Some("u1".into()), ChampionKind::MageScepter, 10);
        assert!(!s.ever_connected);
        s.mark_connected(true);
        s.mark_connected(false);
        assert!(s.ever_connected && !s.connected);
    }
}
