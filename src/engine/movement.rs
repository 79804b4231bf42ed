// Path following for mobile entities.

use super::config::{TickClock, MIN_UPDATE_INTERVAL_TICK};
use super::geometry::Vector2;
use super::grid::{GridCell, MapGrid};

/// An accepted move order: the pathfinder's cells and a forward-only cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveContext {
    pub target: Vector2,
    pub path: Vec<GridCell>,
    waypoints: Vec<Vector2>,
    cursor: usize,
    pub issued_tick: i64,
}

impl MoveContext {
    /// Returns `None` for an empty path.
    ///
    /// The start cell is skipped unless it is the only cell. When the path ends in
    /// the target's own cell the final waypoint is the exact target point.
    pub fn new(target: Vector2, path: Vec<GridCell>, grid: &MapGrid, tick: i64) -> Option<Self> {
        let last = *path.last()?;
        let mut waypoints: Vec<Vector2> = path.iter().map(|c| grid.to_position(*c)).collect();
        if grid.to_grid_cell(target) == last {
            if let Some(wp) = waypoints.last_mut() {
                *wp = target;
            }
        }
        let cursor = if path.len() > 1 { 1 } else { 0 };
        Some(Self {
            target,
            path,
            waypoints,
            cursor,
            issued_tick: tick,
        })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    pub fn next_waypoint(&self) -> Option<Vector2> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn final_waypoint(&self) -> Option<Vector2> {
        self.waypoints.last().copied()
    }
}

#[derive(Debug, Clone)]
pub struct MovingComponent {
    pub speed: f32,
    pub distance_per_tick: f32,
    context: Option<MoveContext>,
    last_order_tick: Option<i64>,
}

impl MovingComponent {
    pub fn new(speed: f32, clock: &TickClock) -> Self {
        Self {
            speed,
            distance_per_tick: clock.distance_per_tick(speed),
            context: None,
            last_order_tick: None,
        }
    }

    pub fn context(&self) -> Option<&MoveContext> {
        self.context.as_ref()
    }

    pub fn is_moving(&self) -> bool {
        self.context.is_some()
    }

    /// Whether a new order would pass the anti-spam gate at `tick`.
    pub fn can_accept(&self, forced: bool, tick: i64) -> bool {
        forced
            || self
                .last_order_tick
                .map_or(true, |last| tick - last >= MIN_UPDATE_INTERVAL_TICK)
    }

    /// Replaces the active order. `None` stops movement. Non-forced orders
    /// arriving too soon after the last accepted one are refused.
    pub fn set_move_context(&mut self, ctx: Option<MoveContext>, forced: bool, tick: i64) -> bool {
        let Some(ctx) = ctx else {
            self.context = None;
            return true;
        };
        if !self.can_accept(forced, tick) {
            tracing::debug!(tick, "Move order too soon, ignored");
            return false;
        }
        self.last_order_tick = Some(tick);
        self.context = Some(ctx);
        true
    }

    pub fn stop(&mut self) {
        self.context = None;
    }

    /// Spends one tick of travel budget along the path starting at `from`.
    /// Returns the new position if it changed. Clears the order once the path is exhausted.
    pub fn step(&mut self, from: Vector2) -> Option<Vector2> {
        let ctx = self.context.as_mut()?;
        let mut budget = self.distance_per_tick;
        let mut pos = from;

        while budget > 0.0 {
            let Some(wp) = ctx.next_waypoint() else {
                break;
            };
            let dist = pos.distance(wp);
            if dist <= budget {
                pos = wp;
                budget -= dist;
                ctx.cursor += 1;
            } else {
                pos = pos + (wp - pos).normalize() * budget;
                budget = 0.0;
            }
        }

        if ctx.is_exhausted() {
            self.context = None;
        }
        (pos != from).then_some(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> MapGrid {
        MapGrid::open(20, 20, 1.0)
    }

    fn order(grid: &MapGrid, from: Vector2, to: Vector2) -> MoveContext {
        let path = super::super::pathfinder::find_path(
            grid,
            grid.to_grid_cell(from),
            grid.to_grid_cell(to),
        );
        MoveContext::new(to, path, grid, 0).unwrap()
    }

    #[test]
    fn test_empty_path_has_no_context() {
        assert!(MoveContext::new(Vector2::ZERO, Vec::new(), &grid(), 0).is_none());
    }

    #[test]
    fn test_single_cell_path_moves_to_exact_target() {
        let g = grid();
        let from = Vector2::new(5.2, 5.2);
        let to = Vector2::new(5.8, 5.6);
        let ctx = order(&g, from, to);
        assert_eq!(ctx.cursor(), 0);
        assert_eq!(ctx.next_waypoint(), Some(to));
    }

    #[test]
    fn test_step_moves_partway_then_arrives() {
        let g = grid();
        let clock = TickClock::new(50);
        let mut m = MovingComponent::new(4.0, &clock); // 0.2 per tick
        let from = Vector2::new(2.5, 2.5);
        let to = Vector2::new(2.5, 3.0);
        assert!(m.set_move_context(Some(order(&g, from, to)), false, 0));

        let p1 = m.step(from).unwrap();
        assert!((p1.y - 2.7).abs() < 1e-5);
        let p2 = m.step(p1).unwrap();
        let p3 = m.step(p2).unwrap();
        assert!((p3.y - 3.0).abs() < 1e-5);
        assert!(!m.is_moving());
        assert_eq!(m.step(p3), None);
    }

    #[test]
    fn test_budget_carries_across_waypoints() {
        let g = grid();
        let clock = TickClock::new(1000);
        let mut m = MovingComponent::new(10.0, &clock);
        let from = Vector2::new(0.5, 19.5);
        let to = Vector2::new(3.5, 19.5);
        m.set_move_context(Some(order(&g, from, to)), true, 0);
        let end = m.step(from).unwrap();
        assert_eq!(end, to);
        assert!(!m.is_moving());
    }

    #[test]
    fn test_non_forced_order_too_soon_rejected() {
        let g = grid();
        let clock = TickClock::default();
        let mut m = MovingComponent::new(4.0, &clock);
        let from = Vector2::new(1.5, 1.5);
        assert!(m.set_move_context(Some(order(&g, from, Vector2::new(8.5, 8.5))), false, 10));
        let second = order(&g, from, Vector2::new(1.5, 8.5));
        assert!(!m.set_move_context(Some(second.clone()), false, 11));
        assert_eq!(m.context().unwrap().target, Vector2::new(8.5, 8.5));
        assert!(m.set_move_context(Some(second.clone()), true, 11));
        assert!(m.set_move_context(Some(second), false, 13));
    }

    #[test]
    fn test_none_stops() {
        let g = grid();
        let mut m = MovingComponent::new(4.0, &TickClock::default());
        m.set_move_context(Some(order(&g, Vector2::new(1.5, 1.5), Vector2::new(5.5, 5.5))), false, 0);
        assert!(m.is_moving());
        assert!(m.set_move_context(None, false, 0));
        assert!(!m.is_moving());
    }
}
