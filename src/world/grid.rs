//! Fixed-size occupancy grid storage.

use crate::core::{Cell, CellCounts, CellState, GridCoord, WorldPoint};

/// Fixed-size 2D occupancy grid, created once per session.
///
/// World-to-grid transforms reject out-of-bounds inputs instead of clamping;
/// a rejected coordinate from a trusted source is a configuration bug that
/// callers surface loudly.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution: f32,
    origin: WorldPoint,
    cells: Vec<Cell>,
}

impl OccupancyGrid {
    /// Create a new grid with all cells unknown
    pub fn new(width: usize, height: usize, resolution: f32, origin: WorldPoint) -> Self {
        Self {
            width,
            height,
            resolution,
            origin,
            cells: vec![Cell::default(); width * height],
        }
    }

    /// Grid width in cells
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell resolution in meters
    #[inline]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    /// Grid origin in world coordinates
    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Check if a coordinate is inside the grid
    #[inline]
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as usize) < self.width
            && (coord.y as usize) < self.height
    }

    /// Row-major index for an in-bounds coordinate
    #[inline]
    pub fn index(&self, coord: GridCoord) -> usize {
        coord.y as usize * self.width + coord.x as usize
    }

    /// Coordinate for a row-major index
    #[inline]
    pub fn coord_of(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Convert world coordinates to grid coordinates.
    /// Returns `None` for out-of-bounds inputs.
    pub fn world_to_grid(&self, point: WorldPoint) -> Option<GridCoord> {
        let gx = ((point.x - self.origin.x) / self.resolution).floor() as i32;
        let gy = ((point.y - self.origin.y) / self.resolution).floor() as i32;
        let coord = GridCoord::new(gx, gy);
        if self.in_bounds(coord) {
            Some(coord)
        } else {
            None
        }
    }

    /// Convert grid coordinates to world coordinates (cell center).
    /// Returns `None` for out-of-bounds inputs.
    pub fn grid_to_world(&self, coord: GridCoord) -> Option<WorldPoint> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some(WorldPoint::new(
            self.origin.x + (coord.x as f32 + 0.5) * self.resolution,
            self.origin.y + (coord.y as f32 + 0.5) * self.resolution,
        ))
    }

    /// Get a cell, or `None` when out of bounds
    #[inline]
    pub fn cell(&self, coord: GridCoord) -> Option<&Cell> {
        if self.in_bounds(coord) {
            Some(&self.cells[self.index(coord)])
        } else {
            None
        }
    }

    /// Get a mutable cell, or `None` when out of bounds
    #[inline]
    pub fn cell_mut(&mut self, coord: GridCoord) -> Option<&mut Cell> {
        if self.in_bounds(coord) {
            let idx = self.index(coord);
            Some(&mut self.cells[idx])
        } else {
            None
        }
    }

    /// Cell state, `Unknown` when out of bounds
    #[inline]
    pub fn state(&self, coord: GridCoord) -> CellState {
        self.cell(coord).map(|c| c.state).unwrap_or_default()
    }

    /// Raw cell slice (row-major)
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Raw mutable cell slice (row-major)
    #[inline]
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Count cells by state
    pub fn counts(&self) -> CellCounts {
        let mut counts = CellCounts::default();
        for cell in &self.cells {
            match cell.state {
                CellState::Unknown => counts.unknown += 1,
                CellState::Free => counts.free += 1,
                CellState::Obstacle => counts.obstacle += 1,
                CellState::Explored => counts.explored += 1,
            }
        }
        counts
    }

    /// Reset all cells to unknown
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
    }
}
