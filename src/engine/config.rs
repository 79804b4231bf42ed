// Gameplay constants and tick arithmetic.

/// Default simulation tick interval in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Minimum ticks between two accepted non-forced move orders.
pub const MIN_UPDATE_INTERVAL_TICK: i64 = 2;

/// Share of the victim's gold taken by the slot that kills a champion.
pub const CHAMPION_KILL_GOLD_STEAL: f64 = 0.3;

/// Attempts at sampling a walkable gold mine position before falling back.
pub const GOLD_MINE_SPAWN_ATTEMPTS: usize = 32;

/// Step used when tracing a dash across the grid.
pub const DASH_STEP: f32 = 0.25;

/// Owner value sent on the wire for neutral entities.
pub const NO_SLOT: i16 = -1;

// Wire codes for entity kinds in snapshots.
pub const KIND_CHAMPION: u8 = 0;
pub const KIND_TROOP: u8 = 1;
pub const KIND_TOWER: u8 = 2;
pub const KIND_BURG: u8 = 3;
pub const KIND_GOLD_MINE: u8 = 4;

// Champion archetype codes.
pub const CHAMPION_MELEE_AXE: u8 = 0;
pub const CHAMPION_ASSASSIN_SWORD: u8 = 1;
pub const CHAMPION_MARKSMAN_CROSSBOW: u8 = 2;
pub const CHAMPION_MAGE_SCEPTER: u8 = 3;

/// Converts wall-clock durations into whole ticks for one process-wide interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickClock {
    interval_ms: u64,
}

impl TickClock {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }

    /// `round(seconds * 1000 / interval)`.
    pub fn seconds_to_ticks(&self, seconds: f64) -> i64 {
        (seconds * 1000.0 / self.interval_ms as f64).round() as i64
    }

    pub fn ticks_to_seconds(&self, ticks: i64) -> f64 {
        ticks as f64 * self.interval_ms as f64 / 1000.0
    }

    /// Distance covered in one tick at `speed` units per second.
    pub fn distance_per_tick(&self, speed: f32) -> f32 {
        self.interval_ms as f32 * speed / 1000.0
    }

    /// `round(1000 / (attack_speed * interval))`, never below one tick.
    pub fn attack_delay_ticks(&self, attack_speed: f32) -> i64 {
        if attack_speed <= 0.0 {
            return i64::MAX / 4;
        }
        let delay = (1000.0 / (attack_speed as f64 * self.interval_ms as f64)).round() as i64;
        delay.max(1)
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_ticks_rounds() {
        let clock = TickClock::new(50);
        assert_eq!(clock.seconds_to_ticks(1.0), 20);
        assert_eq!(clock.seconds_to_ticks(5.0), 100);
        assert_eq!(clock.seconds_to_ticks(0.5), 10);

        let odd = TickClock::new(30);
        assert_eq!(odd.seconds_to_ticks(1.0), 33);
    }

    #[test]
    fn test_attack_delay() {
        let clock = TickClock::new(50);
        assert_eq!(clock.attack_delay_ticks(1.0), 20);
        assert_eq!(clock.attack_delay_ticks(2.0), 10);
        assert_eq!(clock.attack_delay_ticks(100.0), 1);
    }

    #[test]
    fn test_distance_per_tick() {
        let clock = TickClock::new(50);
        assert!((clock.distance_per_tick(4.0) - 0.2).abs() < 1e-6);
    }
}
