// Navigation grid: walkability and cell/world conversions.

use serde::Deserialize;

use super::geometry::Vector2;

/// A cell address; row 0 is the top edge of the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

impl GridCell {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone)]
pub struct MapGrid {
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f32,
    /// World position of the top-left corner.
    pub origin: Vector2,
    walkable: Vec<bool>,
}

// --- JSON deserialization helpers ---

#[derive(Deserialize)]
pub(crate) struct GridJson {
    rows: usize,
    cols: usize,
    #[serde(default = "default_cell_size")]
    cell_size: f32,
    origin: Option<Vector2>,
    /// `[row, col]` pairs of blocked cells.
    #[serde(default)]
    blocked: Vec<[usize; 2]>,
    /// One string per row, `#` marks a blocked cell.
    #[serde(default)]
    layout: Vec<String>,
}

fn default_cell_size() -> f32 {
    1.0
}

impl MapGrid {
    /// Fully walkable grid whose origin is placed so the map spans
    /// `[0, cols * cell_size] x [0, rows * cell_size]`.
    pub fn open(rows: usize, cols: usize, cell_size: f32) -> Self {
        Self {
            rows,
            cols,
            cell_size,
            origin: Vector2::new(0.0, rows as f32 * cell_size),
            walkable: vec![true; rows * cols],
        }
    }

    pub(crate) fn from_json(json: GridJson) -> Result<Self, String> {
        if json.rows == 0 || json.cols == 0 {
            return Err("grid dimensions must be > 0".into());
        }
        if json.cell_size <= 0.0 {
            return Err("cell_size must be > 0".into());
        }

        let mut grid = MapGrid::open(json.rows, json.cols, json.cell_size);
        if let Some(origin) = json.origin {
            grid.origin = origin;
        }

        for [row, col] in json.blocked {
            if row >= json.rows || col >= json.cols {
                return Err(format!("blocked cell ({row}, {col}) out of bounds"));
            }
            grid.set_walkable(GridCell::new(row as i32, col as i32), false);
        }

        if json.layout.len() > json.rows {
            return Err(format!("layout has {} rows, grid has {}", json.layout.len(), json.rows));
        }
        for (row, line) in json.layout.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                if col >= json.cols {
                    return Err(format!("layout row {row} is wider than {} columns", json.cols));
                }
                if ch == '#' {
                    grid.set_walkable(GridCell::new(row as i32, col as i32), false);
                }
            }
        }

        Ok(grid)
    }

    fn index(&self, cell: GridCell) -> usize {
        cell.row as usize * self.cols + cell.col as usize
    }

    pub fn is_out_grid(&self, cell: GridCell) -> bool {
        cell.row < 0 || cell.col < 0 || cell.row as usize >= self.rows || cell.col as usize >= self.cols
    }

    /// In bounds and not blocked.
    pub fn is_walkable(&self, cell: GridCell) -> bool {
        !self.is_out_grid(cell) && self.walkable[self.index(cell)]
    }

    pub fn set_walkable(&mut self, cell: GridCell, walkable: bool) -> bool {
        if self.is_out_grid(cell) {
            return false;
        }
        let idx = self.index(cell);
        self.walkable[idx] = walkable;
        true
    }

    /// World position of a cell's center.
    pub fn to_position(&self, cell: GridCell) -> Vector2 {
        let cs = self.cell_size;
        Vector2::new(
            self.origin.x + cell.col as f32 * cs + cs / 2.0,
            self.origin.y - cell.row as f32 * cs - cs / 2.0,
        )
    }

    /// Cell containing `pos`, clamped into the grid.
    pub fn to_grid_cell(&self, pos: Vector2) -> GridCell {
        let row = ((self.origin.y - pos.y) / self.cell_size).floor() as i64;
        let col = ((pos.x - self.origin.x) / self.cell_size).floor() as i64;
        GridCell::new(
            row.clamp(0, self.rows as i64 - 1) as i32,
            col.clamp(0, self.cols as i64 - 1) as i32,
        )
    }

    pub fn contains_position(&self, pos: Vector2) -> bool {
        let max_x = self.origin.x + self.cols as f32 * self.cell_size;
        let min_y = self.origin.y - self.rows as f32 * self.cell_size;
        pos.x >= self.origin.x && pos.x <= max_x && pos.y <= self.origin.y && pos.y >= min_y
    }

    pub fn is_walkable_position(&self, pos: Vector2) -> bool {
        self.contains_position(pos) && self.is_walkable(self.to_grid_cell(pos))
    }

    /// Number of walkable cells.
    pub fn walkable_count(&self) -> usize {
        self.walkable.iter().filter(|w| **w).count()
    }
}
