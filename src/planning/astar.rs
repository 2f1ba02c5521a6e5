//! A* planner over the inflated grid.
//!
//! Planning failures are data, not panics: every outcome is a [`PathResult`]
//! and the caller decides how to degrade.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use tracing::debug;

use crate::config::PlannerConfig;
use crate::core::{CellState, GridCoord, WorldPoint};
use crate::world::OccupancyGrid;

use super::inflation::InflatedGrid;

/// Outcome of a planning request
#[derive(Clone, Debug, Serialize)]
pub struct PathResult {
    pub success: bool,
    /// Simplified waypoints in world meters, start through goal. Empty on
    /// failure.
    pub waypoints: Vec<WorldPoint>,
    /// Accumulated traversal cost in cell units
    pub cost: f32,
    /// Failure reason, `None` on success
    pub error: Option<String>,
}

impl PathResult {
    fn failure(reason: &str) -> Self {
        Self {
            success: false,
            waypoints: Vec::new(),
            cost: 0.0,
            error: Some(reason.to_string()),
        }
    }

    /// Position after advancing from `from` along the path by at most
    /// `step_m` meters. Used by simulation drivers to move the robot.
    pub fn step_toward(&self, from: WorldPoint, step_m: f32) -> WorldPoint {
        let mut remaining = step_m;
        let mut position = from;
        for waypoint in &self.waypoints {
            let d = position.distance(waypoint);
            if d < 1e-6 {
                continue;
            }
            if d <= remaining {
                remaining -= d;
                position = *waypoint;
            } else {
                let angle = position.angle_to(waypoint);
                return position.point_at(angle, remaining);
            }
        }
        position
    }
}

/// Open-set entry ordered by f-score for a min-heap
struct Node {
    f: f32,
    g: f32,
    index: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the lowest f-score
        other.f.partial_cmp(&self.f).unwrap_or(Ordering::Equal)
    }
}

/// A* path planner, 8-connected, with unknown-cell cost weighting
pub struct LocalPlanner {
    config: PlannerConfig,
}

impl LocalPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Plan a path between world positions over the given grid
    pub fn plan_path_world(
        &self,
        grid: &OccupancyGrid,
        start: WorldPoint,
        goal: WorldPoint,
    ) -> PathResult {
        let Some(start_coord) = grid.world_to_grid(start) else {
            return PathResult::failure("start out of bounds");
        };
        let Some(goal_coord) = grid.world_to_grid(goal) else {
            return PathResult::failure("goal out of bounds");
        };

        let inflated = InflatedGrid::new(grid, self.config.inflation_radius_m);
        if inflated.is_blocked(start_coord) {
            return PathResult::failure("start blocked");
        }
        if inflated.is_blocked(goal_coord) {
            return PathResult::failure("goal blocked");
        }

        if start_coord == goal_coord {
            return PathResult {
                success: true,
                waypoints: vec![goal],
                cost: 0.0,
                error: None,
            };
        }

        match self.search(&inflated, start_coord, goal_coord) {
            Some((cells, cost)) => {
                let simplified = simplify(&cells);
                let mut waypoints: Vec<WorldPoint> = simplified
                    .iter()
                    .filter_map(|c| grid.grid_to_world(*c))
                    .collect();
                // Snap the final waypoint to the requested goal position
                if let Some(last) = waypoints.last_mut() {
                    *last = goal;
                }
                debug!(
                    cells = cells.len(),
                    waypoints = waypoints.len(),
                    cost,
                    "path found"
                );
                PathResult {
                    success: true,
                    waypoints,
                    cost,
                    error: None,
                }
            }
            None => PathResult::failure("no path"),
        }
    }

    fn search(
        &self,
        inflated: &InflatedGrid,
        start: GridCoord,
        goal: GridCoord,
    ) -> Option<(Vec<GridCoord>, f32)> {
        let grid = inflated.grid();
        let size = grid.width() * grid.height();

        let mut g_score = vec![f32::INFINITY; size];
        let mut came_from: Vec<usize> = vec![usize::MAX; size];
        let mut closed = vec![false; size];
        let mut open = BinaryHeap::new();

        let start_idx = grid.index(start);
        g_score[start_idx] = 0.0;
        open.push(Node {
            f: heuristic(start, goal),
            g: 0.0,
            index: start_idx,
        });

        let mut iterations = 0;
        while let Some(node) = open.pop() {
            iterations += 1;
            if iterations > self.config.max_iterations {
                return None;
            }
            if closed[node.index] {
                continue;
            }
            closed[node.index] = true;

            let coord = grid.coord_of(node.index);
            if coord == goal {
                return Some((reconstruct(grid, &came_from, node.index), node.g));
            }

            for neighbor in coord.neighbors_8() {
                if inflated.is_blocked(neighbor) {
                    continue;
                }
                let n_idx = grid.index(neighbor);
                if closed[n_idx] {
                    continue;
                }

                let step = if neighbor.x != coord.x && neighbor.y != coord.y {
                    std::f32::consts::SQRT_2
                } else {
                    1.0
                };
                let multiplier = if inflated.state(neighbor) == CellState::Unknown {
                    self.config.unknown_cell_cost
                } else {
                    1.0
                };
                let tentative = node.g + step * multiplier;
                if tentative < g_score[n_idx] {
                    g_score[n_idx] = tentative;
                    came_from[n_idx] = node.index;
                    open.push(Node {
                        f: tentative + heuristic(neighbor, goal),
                        g: tentative,
                        index: n_idx,
                    });
                }
            }
        }

        None
    }
}

/// Octile distance, admissible for 8-connected unit-cost grids
fn heuristic(a: GridCoord, b: GridCoord) -> f32 {
    let dx = (a.x - b.x).abs() as f32;
    let dy = (a.y - b.y).abs() as f32;
    let (min, max) = if dx < dy { (dx, dy) } else { (dy, dx) };
    max + (std::f32::consts::SQRT_2 - 1.0) * min
}

fn reconstruct(grid: &OccupancyGrid, came_from: &[usize], mut index: usize) -> Vec<GridCoord> {
    let mut cells = vec![grid.coord_of(index)];
    while came_from[index] != usize::MAX {
        index = came_from[index];
        cells.push(grid.coord_of(index));
    }
    cells.reverse();
    cells
}

/// Drop interior waypoints where the step direction does not change
fn simplify(cells: &[GridCoord]) -> Vec<GridCoord> {
    if cells.len() <= 2 {
        return cells.to_vec();
    }
    let mut out = vec![cells[0]];
    for window in cells.windows(3) {
        let d1 = window[1] - window[0];
        let d2 = window[2] - window[1];
        if d1 != d2 {
            out.push(window[1]);
        }
    }
    out.push(cells[cells.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> LocalPlanner {
        LocalPlanner::new(PlannerConfig::default())
    }

    fn open_grid() -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(50, 50, 0.10, WorldPoint::ZERO);
        for cell in grid.cells_mut() {
            cell.observe(CellState::Free, 1);
        }
        grid
    }

    fn add_wall(grid: &mut OccupancyGrid, x: i32, y_range: std::ops::Range<i32>) {
        for y in y_range {
            grid.cell_mut(GridCoord::new(x, y))
                .unwrap()
                .observe(CellState::Obstacle, 1);
        }
    }

    #[test]
    fn test_straight_path_simplified() {
        let grid = open_grid();
        let result = planner().plan_path_world(
            &grid,
            WorldPoint::new(0.55, 2.55),
            WorldPoint::new(3.55, 2.55),
        );
        assert!(result.success, "{:?}", result.error);
        // Collinear interior waypoints are dropped
        assert_eq!(result.waypoints.len(), 2);
        let last = result.waypoints.last().unwrap();
        assert!((last.x - 3.55).abs() < 1e-6);
    }

    #[test]
    fn test_path_routes_around_wall() {
        let mut grid = open_grid();
        add_wall(&mut grid, 25, 0..45);
        let result = planner().plan_path_world(
            &grid,
            WorldPoint::new(1.05, 2.05),
            WorldPoint::new(4.05, 2.05),
        );
        assert!(result.success, "{:?}", result.error);
        // The detour is longer than the straight-line distance
        assert!(result.cost > 30.0);
        // No waypoint lands on the wall column near it
        for w in &result.waypoints {
            let c = grid.world_to_grid(*w).unwrap();
            if c.x == 25 {
                assert!(c.y >= 45);
            }
        }
    }

    #[test]
    fn test_no_path_when_walled_off() {
        let mut grid = open_grid();
        add_wall(&mut grid, 25, 0..50);
        let result = planner().plan_path_world(
            &grid,
            WorldPoint::new(1.05, 2.05),
            WorldPoint::new(4.05, 2.05),
        );
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no path"));
        assert!(result.waypoints.is_empty());
    }

    #[test]
    fn test_out_of_bounds_endpoints() {
        let grid = open_grid();
        let p = planner();
        let result = p.plan_path_world(&grid, WorldPoint::new(-1.0, 0.5), WorldPoint::new(1.0, 1.0));
        assert_eq!(result.error.as_deref(), Some("start out of bounds"));
        let result = p.plan_path_world(&grid, WorldPoint::new(1.0, 1.0), WorldPoint::new(9.0, 0.5));
        assert_eq!(result.error.as_deref(), Some("goal out of bounds"));
    }

    #[test]
    fn test_goal_inside_inflation_is_blocked() {
        let mut grid = open_grid();
        grid.cell_mut(GridCoord::new(30, 30))
            .unwrap()
            .observe(CellState::Obstacle, 1);
        // Goal one cell from the obstacle, inside the 0.15 m inflation ring
        let goal = grid.grid_to_world(GridCoord::new(31, 30)).unwrap();
        let result = planner().plan_path_world(&grid, WorldPoint::new(1.05, 1.05), goal);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("goal blocked"));
    }

    #[test]
    fn test_start_inside_inflation_is_blocked() {
        let mut grid = open_grid();
        grid.cell_mut(GridCoord::new(30, 30))
            .unwrap()
            .observe(CellState::Obstacle, 1);
        // Start one cell from the obstacle, inside the 0.15 m inflation ring
        let start = grid.grid_to_world(GridCoord::new(31, 30)).unwrap();
        let result = planner().plan_path_world(&grid, start, WorldPoint::new(1.05, 1.05));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("start blocked"));
        assert!(result.waypoints.is_empty());
    }

    #[test]
    fn test_unknown_cost_prefers_known_route() {
        // Two corridors: a shorter unknown one and a longer free one
        let mut grid = OccupancyGrid::new(50, 50, 0.10, WorldPoint::ZERO);
        for y in 0..50 {
            for x in 0..50 {
                let coord = GridCoord::new(x, y);
                // Leave a band unknown in the middle rows
                if (20..30).contains(&y) && x > 5 && x < 45 {
                    continue;
                }
                grid.cell_mut(coord).unwrap().observe(CellState::Free, 1);
            }
        }
        let result = planner().plan_path_world(
            &grid,
            WorldPoint::new(2.55, 1.05),
            WorldPoint::new(2.55, 4.05),
        );
        assert!(result.success, "{:?}", result.error);
        // With unknown cells at 5x cost the planner skirts the band edge
        let crossings = result
            .waypoints
            .windows(2)
            .filter(|pair| {
                let a = grid.world_to_grid(pair[0]).unwrap();
                let b = grid.world_to_grid(pair[1]).unwrap();
                (a.x <= 5 && b.x <= 5) || (a.x >= 45 && b.x >= 45)
            })
            .count();
        assert!(crossings > 0 || result.cost > 30.0);
    }

    #[test]
    fn test_same_cell_start_and_goal() {
        let grid = open_grid();
        let result = planner().plan_path_world(
            &grid,
            WorldPoint::new(1.02, 1.02),
            WorldPoint::new(1.04, 1.04),
        );
        assert!(result.success);
        assert_eq!(result.waypoints.len(), 1);
        assert!(result.cost.abs() < 1e-6);
    }

    #[test]
    fn test_step_toward_advances_along_path() {
        let grid = open_grid();
        let start = WorldPoint::new(0.55, 2.55);
        let goal = WorldPoint::new(3.55, 2.55);
        let result = planner().plan_path_world(&grid, start, goal);
        assert!(result.success);

        let next = result.step_toward(start, 0.3);
        assert!((start.distance(&next) - 0.3).abs() < 1e-4);
        // A giant step reaches the final waypoint exactly
        let end = result.step_toward(start, 100.0);
        assert!(end.distance(&goal) < 1e-4);
    }
}
