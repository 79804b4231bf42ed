// Per-slot gold balance. Never negative.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldComponent {
    current: i32,
}

impl GoldComponent {
    pub fn new(initial: i32) -> Self {
        Self {
            current: initial.max(0),
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    /// Negative values clamp to zero.
    pub fn set_current_gold(&mut self, gold: i32) {
        self.current = gold.max(0);
    }

    /// Negative amounts are ignored.
    pub fn increase_gold(&mut self, amount: i32) {
        if amount > 0 {
            self.current = self.current.saturating_add(amount);
        }
    }

    /// Removes up to `amount`, stopping at zero. Returns the amount actually removed.
    pub fn decrease_gold(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let taken = amount.min(self.current);
        self.current -= taken;
        taken
    }

    /// Spends `cost` only if the full amount is available.
    pub fn spend_gold(&mut self, cost: i32) -> bool {
        if cost < 0 || self.current < cost {
            tracing::debug!(current = self.current, cost, "Not enough gold");
            return false;
        }
        self.current -= cost;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_negative_clamps_to_zero() {
        let mut g = GoldComponent::new(10);
        g.set_current_gold(-20);
        assert_eq!(g.current(), 0);
        assert_eq!(GoldComponent::new(-3).current(), 0);
    }

    #[test]
    fn test_spend_insufficient_is_noop() {
        let mut g = GoldComponent::new(30);
        assert!(!g.spend_gold(31));
        assert_eq!(g.current(), 30);
        assert!(g.spend_gold(30));
        assert_eq!(g.current(), 0);
    }

    #[test]
    fn test_increase_ignores_negative() {
        let mut g = GoldComponent::new(5);
        g.increase_gold(-10);
        assert_eq!(g.current(), 5);
        g.increase_gold(7);
        assert_eq!(g.current(), 12);
    }

    #[test]
    fn test_decrease_clamps() {
        let mut g = GoldComponent::new(12);
        assert_eq!(g.decrease_gold(5), 5);
        assert_eq!(g.decrease_gold(100), 7);
        assert_eq!(g.current(), 0);
        assert_eq!(g.decrease_gold(-4), 0);
    }
}
