// Hit points with clamping and a single alive-to-dead transition.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthComponent {
    current: i32,
    max: i32,
}

impl HealthComponent {
    pub fn new(max: i32) -> Self {
        let max = max.max(1);
        Self { current: max, max }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Sets HP, clamped to `[0, max]`.
    pub fn set_current_hp(&mut self, hp: i32) {
        self.current = hp.clamp(0, self.max);
    }

    /// Applies damage floored at zero. Returns true only when this call killed the owner.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.is_alive() || amount <= 0 {
            return false;
        }
        self.set_current_hp(self.current.saturating_sub(amount));
        !self.is_alive()
    }
}
