// Theta* search over the navigation grid with closest-approach fallback.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use super::grid::{GridCell, MapGrid};

/// Row/col offsets: orthogonal first, then diagonals.
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Search radius used by `find_closest_walkable`.
const CLOSEST_WALKABLE_LIMIT: usize = 1024;

// --- Theta* internals ---

#[derive(Copy, Clone)]
struct OpenNode {
    f: f64,
    seq: u64,
    idx: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // min-heap on f, earlier insertion wins ties
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn heuristic(a: GridCell, b: GridCell) -> f64 {
    ((a.row - b.row) as f64).hypot((a.col - b.col) as f64)
}

/// Bresenham walk from `from` toward `to`; every visited cell before `to` must be walkable.
pub fn line_of_sight(grid: &MapGrid, from: GridCell, to: GridCell) -> bool {
    let dx = (to.row - from.row).abs();
    let dy = (to.col - from.col).abs();
    let sx = if from.row < to.row { 1 } else { -1 };
    let sy = if from.col < to.col { 1 } else { -1 };
    let mut err = dx - dy;
    let (mut x, mut y) = (from.row, from.col);

    while x != to.row || y != to.col {
        if !grid.is_walkable(GridCell::new(x, y)) {
            return false;
        }
        let err2 = err * 2;
        if err2 > -dy {
            err -= dy;
            x += sx;
        }
        if err2 < dx {
            err += dx;
            y += sy;
        }
    }
    true
}

/// Any-angle path from `start` to `target`, start cell included.
///
/// - start out of the grid or blocked: empty path
/// - `start == target`: `[start]`
/// - target unreachable or blocked: path to the expanded cell closest to the target
pub fn find_path(grid: &MapGrid, start: GridCell, target: GridCell) -> Vec<GridCell> {
    if !grid.is_walkable(start) {
        return Vec::new();
    }
    if start == target {
        return vec![start];
    }

    let cols = grid.cols;
    let size = grid.rows * cols;
    let index = |c: GridCell| c.row as usize * cols + c.col as usize;
    let cell_at = |idx: usize| GridCell::new((idx / cols) as i32, (idx % cols) as i32);

    let mut g_score = vec![f64::INFINITY; size];
    let mut parent = vec![usize::MAX; size];
    let mut closed = vec![false; size];
    let mut open = BinaryHeap::new();
    let mut seq: u64 = 0;

    let start_idx = index(start);
    g_score[start_idx] = 0.0;
    open.push(OpenNode {
        f: heuristic(start, target),
        seq,
        idx: start_idx,
    });

    let mut closest = start_idx;
    let mut closest_h = heuristic(start, target);

    while let Some(node) = open.pop() {
        if closed[node.idx] {
            continue;
        }
        let current = cell_at(node.idx);
        if current == target {
            return reconstruct(&parent, node.idx, cell_at);
        }
        closed[node.idx] = true;

        let h = heuristic(current, target);
        if h < closest_h {
            closest_h = h;
            closest = node.idx;
        }

        for (dr, dc) in DIRECTIONS {
            let next = GridCell::new(current.row + dr, current.col + dc);
            if !grid.is_walkable(next) {
                continue;
            }
            let next_idx = index(next);
            if closed[next_idx] {
                continue;
            }
            let diagonal = dr != 0 && dc != 0;
            if diagonal
                && !grid.is_walkable(GridCell::new(current.row + dr, current.col))
                && !grid.is_walkable(GridCell::new(current.row, current.col + dc))
            {
                continue;
            }

            let grand = parent[node.idx];
            let (tentative_g, via) =
                if grand != usize::MAX && line_of_sight(grid, cell_at(grand), next) {
                    (g_score[grand] + heuristic(cell_at(grand), next), grand)
                } else {
                    let step = if diagonal { std::f64::consts::SQRT_2 } else { 1.0 };
                    (g_score[node.idx] + step, node.idx)
                };

            if tentative_g < g_score[next_idx] {
                g_score[next_idx] = tentative_g;
                parent[next_idx] = via;
                seq += 1;
                open.push(OpenNode {
                    f: tentative_g + heuristic(next, target),
                    seq,
                    idx: next_idx,
                });
            }
        }
    }

    reconstruct(&parent, closest, cell_at)
}

fn reconstruct(
    parent: &[usize],
    mut idx: usize,
    cell_at: impl Fn(usize) -> GridCell,
) -> Vec<GridCell> {
    let mut path = vec![cell_at(idx)];
    while parent[idx] != usize::MAX {
        idx = parent[idx];
        path.push(cell_at(idx));
    }
    path.reverse();
    path
}

/// Nearest walkable cell to `cell` by breadth-first ring search, `cell` itself if walkable.
pub fn find_closest_walkable(grid: &MapGrid, cell: GridCell) -> Option<GridCell> {
    if grid.is_walkable(cell) {
        return Some(cell);
    }
    let mut seen = std::collections::HashSet::new();
    let mut queue = VecDeque::from([cell]);
    seen.insert(cell);

    while let Some(current) = queue.pop_front() {
        if seen.len() > CLOSEST_WALKABLE_LIMIT {
            break;
        }
        for (dr, dc) in DIRECTIONS {
            let next = GridCell::new(current.row + dr, current.col + dc);
            if grid.is_out_grid(next) || !seen.insert(next) {
                continue;
            }
            if grid.is_walkable(next) {
                return Some(next);
            }
            queue.push_back(next);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(grid: &mut MapGrid, col: i32, rows: std::ops::Range<i32>) {
        for r in rows {
            grid.set_walkable(GridCell::new(r, col), false);
        }
    }

    #[test]
    fn test_same_cell_is_single_step() {
        let grid = MapGrid::open(10, 10, 1.0);
        let c = GridCell::new(4, 4);
        assert_eq!(find_path(&grid, c, c), vec![c]);
    }

    #[test]
    fn test_blocked_start_is_empty() {
        let mut grid = MapGrid::open(10, 10, 1.0);
        let start = GridCell::new(2, 2);
        grid.set_walkable(start, false);
        assert!(find_path(&grid, start, GridCell::new(5, 5)).is_empty());
        assert!(find_path(&grid, GridCell::new(-1, 0), GridCell::new(5, 5)).is_empty());
    }

    #[test]
    fn test_open_grid_has_direct_line() {
        let grid = MapGrid::open(10, 10, 1.0);
        let start = GridCell::new(1, 1);
        let target = GridCell::new(7, 4);
        // line of sight everywhere collapses the path to its endpoints
        assert_eq!(find_path(&grid, start, target), vec![start, target]);
    }

    #[test]
    fn test_path_goes_around_wall() {
        let mut grid = MapGrid::open(10, 10, 1.0);
        wall(&mut grid, 5, 0..7);
        let start = GridCell::new(3, 2);
        let target = GridCell::new(3, 8);
        let path = find_path(&grid, start, target);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&target));
        assert!(path.len() > 2);
        for pair in path.windows(2) {
            assert!(line_of_sight(&grid, pair[0], pair[1]));
        }
    }

    #[test]
    fn test_unreachable_target_returns_closest_cell() {
        let mut grid = MapGrid::open(10, 10, 1.0);
        wall(&mut grid, 5, 0..10);
        let start = GridCell::new(4, 1);
        let target = GridCell::new(4, 8);
        let path = find_path(&grid, start, target);
        assert!(!path.is_empty());
        let last = *path.last().unwrap();
        assert_ne!(last, target);
        assert_eq!(last, GridCell::new(4, 4));
    }

    #[test]
    fn test_blocked_target_never_reached() {
        let mut grid = MapGrid::open(10, 10, 1.0);
        let target = GridCell::new(6, 6);
        grid.set_walkable(target, false);
        let path = find_path(&grid, GridCell::new(0, 0), target);
        let last = *path.last().unwrap();
        assert_ne!(last, target);
        assert!((heuristic(last, target) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = MapGrid::open(3, 3, 1.0);
        grid.set_walkable(GridCell::new(0, 1), false);
        grid.set_walkable(GridCell::new(1, 0), false);
        // (0,0) is boxed in diagonally
        let path = find_path(&grid, GridCell::new(0, 0), GridCell::new(2, 2));
        assert_eq!(path, vec![GridCell::new(0, 0)]);
    }

    #[test]
    fn test_deterministic() {
        let mut grid = MapGrid::open(12, 12, 1.0);
        wall(&mut grid, 6, 2..12);
        let a = find_path(&grid, GridCell::new(10, 1), GridCell::new(10, 10));
        let b = find_path(&grid, GridCell::new(10, 1), GridCell::new(10, 10));
        assert_eq!(a, b);
    }

    #[test]
    fn test_find_closest_walkable() {
        let mut grid = MapGrid::open(5, 5, 1.0);
        let c = GridCell::new(2, 2);
        assert_eq!(find_closest_walkable(&grid, c), Some(c));
        grid.set_walkable(c, false);
        let found = find_closest_walkable(&grid, c).unwrap();
        assert!(grid.is_walkable(found));
        assert!(heuristic(found, c) <= std::f64::consts::SQRT_2);
    }
}
