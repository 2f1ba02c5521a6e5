//! Obstacle inflation via a brushfire distance field.

use std::collections::VecDeque;

use crate::core::{CellState, GridCoord};
use crate::world::OccupancyGrid;

/// Occupancy grid with obstacles grown by the robot footprint.
///
/// A multi-source BFS from every obstacle cell produces a per-cell distance
/// field in cell units. Cells within the inflation radius are blocked so the
/// planner treats the robot as a point.
pub struct InflatedGrid<'a> {
    grid: &'a OccupancyGrid,
    blocked: Vec<bool>,
    distance: Vec<f32>,
}

impl<'a> InflatedGrid<'a> {
    pub fn new(grid: &'a OccupancyGrid, inflation_radius_m: f32) -> Self {
        let size = grid.width() * grid.height();
        let radius_cells = inflation_radius_m / grid.resolution();

        let mut distance = vec![f32::INFINITY; size];
        let mut queue = VecDeque::new();

        for idx in 0..size {
            if grid.cells()[idx].state == CellState::Obstacle {
                distance[idx] = 0.0;
                queue.push_back(grid.coord_of(idx));
            }
        }

        // Brushfire wavefront, 8-connected with diagonal step cost
        while let Some(coord) = queue.pop_front() {
            let d = distance[grid.index(coord)];
            for neighbor in coord.neighbors_8() {
                if !grid.in_bounds(neighbor) {
                    continue;
                }
                let step = if neighbor.x != coord.x && neighbor.y != coord.y {
                    std::f32::consts::SQRT_2
                } else {
                    1.0
                };
                let idx = grid.index(neighbor);
                let candidate = d + step;
                if candidate < distance[idx] && candidate <= radius_cells + 1.0 {
                    distance[idx] = candidate;
                    queue.push_back(neighbor);
                }
            }
        }

        let blocked = (0..size)
            .map(|idx| {
                grid.cells()[idx].state == CellState::Obstacle || distance[idx] <= radius_cells
            })
            .collect();

        Self {
            grid,
            blocked,
            distance,
        }
    }

    #[inline]
    pub fn grid(&self) -> &OccupancyGrid {
        self.grid
    }

    #[inline]
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        self.grid.in_bounds(coord)
    }

    /// Is the cell untraversable after inflation?
    #[inline]
    pub fn is_blocked(&self, coord: GridCoord) -> bool {
        !self.grid.in_bounds(coord) || self.blocked[self.grid.index(coord)]
    }

    /// Distance to the nearest obstacle in cell units, infinite when no
    /// obstacle lies within the computed wavefront
    #[inline]
    pub fn clearance_cells(&self, coord: GridCoord) -> f32 {
        if self.grid.in_bounds(coord) {
            self.distance[self.grid.index(coord)]
        } else {
            0.0
        }
    }

    /// State of the underlying cell
    #[inline]
    pub fn state(&self, coord: GridCoord) -> CellState {
        self.grid.state(coord)
    }
}
