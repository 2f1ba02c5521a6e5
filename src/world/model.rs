//! Probabilistic world model: sensor fusion, advisory corrections, frontiers.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::config::{GridConfig, WorldConfig};
use crate::core::{CellState, GridCoord, RobotPose, WorldPoint};
use crate::decision::Correction;
use crate::error::{NavError, Result};

use super::grid::OccupancyGrid;
use super::raycast::BresenhamLine;
use super::serialize::{ascii_grid, grid_snapshot, SnapshotFormat, WorldSnapshot};

/// Confidence a free cell must reach before explored certification
const EXPLORED_MIN_CONFIDENCE: f32 = 0.9;

/// One range reading, relative to the robot heading
#[derive(Clone, Copy, Debug)]
pub struct SensorReading {
    /// Beam angle in radians relative to the robot yaw
    pub angle: f32,
    /// Measured range in meters
    pub range_m: f32,
    /// True when the beam terminated on a surface, false for a max-range
    /// return (nothing within range, endpoint stays unmarked)
    pub hit: bool,
}

/// What a sensor update did to the grid
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateStats {
    /// Cells touched by at least one beam
    pub cells_updated: usize,
    /// Cells whose state changed
    pub cells_changed: usize,
    /// Free cells certified explored this update
    pub explored_promoted: usize,
    /// Beams processed
    pub rays: usize,
}

/// Result of an advisory correction batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CorrectionOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// Occupancy world model.
///
/// Sensor observations are authoritative and move confidence through
/// [`Cell::observe`](crate::core::Cell::observe). Model-proposed corrections
/// are advisory: they pass a confidence gate and never touch explored cells.
pub struct WorldModel {
    grid: OccupancyGrid,
    config: WorldConfig,
    /// Indices whose state changed since the last snapshot, for patch encoding
    dirty: HashSet<usize>,
    tick: u64,
}

impl WorldModel {
    pub fn new(grid: &GridConfig, config: WorldConfig) -> Self {
        Self {
            grid: OccupancyGrid::new(
                grid.width,
                grid.height,
                grid.resolution_m,
                WorldPoint::ZERO,
            ),
            config,
            dirty: HashSet::new(),
            tick: 0,
        }
    }

    #[inline]
    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    #[inline]
    pub fn grid_mut(&mut self) -> &mut OccupancyGrid {
        &mut self.grid
    }

    /// Cycle stamp of the most recent update
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Reset the model to an all-unknown grid
    pub fn reset(&mut self) {
        self.grid.clear();
        self.dirty.clear();
        self.tick = 0;
    }

    /// Fuse a batch of range readings taken at `pose` into the grid.
    ///
    /// Beams mark traversed cells free and the hit cell (if any) obstacle.
    /// A pose outside the grid is a setup defect and fails the update.
    pub fn update_from_sensors(
        &mut self,
        pose: &RobotPose,
        readings: &[SensorReading],
    ) -> Result<UpdateStats> {
        self.tick += 1;
        let tick = self.tick;

        let robot = self.grid.world_to_grid(pose.position()).ok_or_else(|| {
            NavError::BridgeConfiguration(format!(
                "robot pose ({:.2}, {:.2}) outside the grid",
                pose.x, pose.y
            ))
        })?;

        let mut stats = UpdateStats::default();
        for reading in readings {
            let range = reading.range_m.min(self.config.sensor_max_range_m);
            if range <= 0.0 {
                continue;
            }
            stats.rays += 1;

            let endpoint = pose
                .position()
                .point_at(pose.yaw + reading.angle, range);
            let end = self.raw_grid_coord(endpoint);

            // Walk the beam, stopping at the grid edge. The final in-bounds
            // cell is the hit cell only when the beam actually terminated.
            let mut prev: Option<GridCoord> = None;
            for coord in BresenhamLine::new(robot, end) {
                if !self.grid.in_bounds(coord) {
                    break;
                }
                if let Some(p) = prev {
                    self.sense(p, CellState::Free, tick, &mut stats);
                }
                prev = Some(coord);
            }
            if let Some(last) = prev {
                let state = if reading.hit && last == end {
                    CellState::Obstacle
                } else {
                    CellState::Free
                };
                self.sense(last, state, tick, &mut stats);
            }
        }

        self.decay_stale(tick);

        debug!(
            rays = stats.rays,
            updated = stats.cells_updated,
            changed = stats.cells_changed,
            promoted = stats.explored_promoted,
            "sensor update"
        );
        Ok(stats)
    }

    /// Record a single observed point, used by detection-based bridges
    pub fn observe_point(&mut self, point: WorldPoint, state: CellState, confidence: f32) -> bool {
        let Some(coord) = self.grid.world_to_grid(point) else {
            return false;
        };
        let tick = self.tick;
        let idx = self.grid.index(coord);
        let cell = &mut self.grid.cells_mut()[idx];
        let changed = cell.state != state;
        cell.overwrite(state, confidence, tick);
        if changed {
            self.dirty.insert(idx);
        }
        changed
    }

    /// Apply advisory corrections behind the confidence gate.
    ///
    /// A correction is skipped when its proposed confidence is below
    /// `min_confidence`, when it targets an explored cell, or when the
    /// existing cell confidence exceeds `max_override`. Applied corrections
    /// store at most `max_override` confidence so a later correction can
    /// still revise them.
    pub fn apply_corrections(
        &mut self,
        corrections: &[Correction],
        min_confidence: f32,
        max_override: f32,
    ) -> CorrectionOutcome {
        let tick = self.tick;
        let mut outcome = CorrectionOutcome::default();

        for correction in corrections {
            if correction.confidence < min_confidence {
                trace!(?correction, "correction below confidence floor, skipped");
                outcome.skipped += 1;
                continue;
            }
            let point = WorldPoint::new(correction.pos_m[0], correction.pos_m[1]);
            let Some(coord) = self.grid.world_to_grid(point) else {
                warn!(?correction, "correction outside the grid, skipped");
                outcome.skipped += 1;
                continue;
            };
            let idx = self.grid.index(coord);
            let cell = &mut self.grid.cells_mut()[idx];
            if cell.state == CellState::Explored {
                trace!(?coord, "correction targets explored cell, skipped");
                outcome.skipped += 1;
                continue;
            }
            if cell.confidence > max_override {
                trace!(
                    ?coord,
                    existing = cell.confidence,
                    "cell confidence above override ceiling, skipped"
                );
                outcome.skipped += 1;
                continue;
            }

            let changed = cell.state != correction.observed_state;
            cell.overwrite(
                correction.observed_state,
                correction.confidence.min(max_override),
                tick,
            );
            if changed {
                self.dirty.insert(idx);
            }
            outcome.applied += 1;
        }

        outcome
    }

    /// Traversable cells bordering unknown space (4-adjacency)
    pub fn find_frontiers(&self) -> Vec<GridCoord> {
        let mut frontiers = Vec::new();
        for y in 0..self.grid.height() as i32 {
            for x in 0..self.grid.width() as i32 {
                let coord = GridCoord::new(x, y);
                if !self.grid.state(coord).is_traversable() {
                    continue;
                }
                let borders_unknown = coord.neighbors_4().iter().any(|n| {
                    self.grid.in_bounds(*n) && self.grid.state(*n) == CellState::Unknown
                });
                if borders_unknown {
                    frontiers.push(coord);
                }
            }
        }
        frontiers
    }

    /// Distance in meters to the nearest obstacle cell within a square
    /// search window, or the window radius when none is found
    pub fn nearest_obstacle_distance(&self, coord: GridCoord, max_radius_m: f32) -> f32 {
        let radius = (max_radius_m / self.grid.resolution()).ceil() as i32;
        let mut best = f32::INFINITY;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let other = GridCoord::new(coord.x + dx, coord.y + dy);
                if self.grid.state(other) == CellState::Obstacle {
                    best = best.min(coord.euclidean_distance(&other));
                }
            }
        }
        if best.is_finite() {
            best * self.grid.resolution()
        } else {
            max_radius_m
        }
    }

    /// Count unknown cells in a square window around a coordinate
    pub fn count_unknown_near(&self, coord: GridCoord, radius: i32) -> usize {
        let mut count = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let other = GridCoord::new(coord.x + dx, coord.y + dy);
                if self.grid.in_bounds(other) && self.grid.state(other) == CellState::Unknown {
                    count += 1;
                }
            }
        }
        count
    }

    /// Produce the textual world views for a decision frame.
    ///
    /// Both formats drain the dirty set: a full snapshot resets the patch
    /// baseline, a patch consumes the accumulated deltas.
    pub fn serialize(
        &mut self,
        format: SnapshotFormat,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
    ) -> Result<WorldSnapshot> {
        let changed: Vec<usize> = self.dirty.drain().collect();
        let snapshot = grid_snapshot(&self.grid, format, &changed);
        let grid_json = serde_json::to_string(&snapshot)?;

        let ascii = ascii_grid(&self.grid, pose, goal);

        let counts = self.grid.counts();
        let frontier_count = self.find_frontiers().len();
        let robot_coord = self.grid.world_to_grid(pose.position());
        let nearest_obstacle_m = robot_coord
            .map(|c| self.nearest_obstacle_distance(c, self.config.sensor_max_range_m));
        let symbolic = serde_json::to_string(&serde_json::json!({
            "cells": {
                "unknown": counts.unknown,
                "free": counts.free,
                "obstacle": counts.obstacle,
                "explored": counts.explored,
            },
            "explored_ratio": counts.known() as f32 / counts.total() as f32,
            "robot": { "x": pose.x, "y": pose.y, "yaw": pose.yaw },
            "goal": goal.map(|g| serde_json::json!({
                "x": g.x,
                "y": g.y,
                "distance_m": pose.distance_to(&g),
                "bearing_rad": pose.position().angle_to(&g),
            })),
            "frontier_count": frontier_count,
            "nearest_obstacle_m": nearest_obstacle_m,
        }))?;

        Ok(WorldSnapshot {
            grid_json,
            ascii,
            symbolic,
        })
    }

    /// Grid coordinate without bounds checking, for ray endpoints that may
    /// land outside the grid
    fn raw_grid_coord(&self, point: WorldPoint) -> GridCoord {
        let origin = self.grid.origin();
        let res = self.grid.resolution();
        GridCoord::new(
            ((point.x - origin.x) / res).floor() as i32,
            ((point.y - origin.y) / res).floor() as i32,
        )
    }

    /// Apply one observation and track promotion and dirty state
    fn sense(&mut self, coord: GridCoord, observed: CellState, tick: u64, stats: &mut UpdateStats) {
        let explored_count = self.config.explored_observation_count;
        let idx = self.grid.index(coord);
        let cell = &mut self.grid.cells_mut()[idx];

        // Explored cells stay explored under consistent free observations
        let effective = if cell.state == CellState::Explored && observed == CellState::Free {
            CellState::Explored
        } else {
            observed
        };

        stats.cells_updated += 1;
        let changed = cell.observe(effective, tick);
        if changed {
            stats.cells_changed += 1;
            self.dirty.insert(idx);
        }

        if cell.state == CellState::Free
            && cell.observations >= explored_count
            && cell.confidence >= EXPLORED_MIN_CONFIDENCE
        {
            cell.state = CellState::Explored;
            stats.explored_promoted += 1;
            self.dirty.insert(idx);
        }
    }

    /// Decay confidence of known, non-explored cells not touched this tick
    fn decay_stale(&mut self, tick: u64) {
        let rate = self.config.confidence_decay;
        if rate <= 0.0 {
            return;
        }
        for cell in self.grid.cells_mut() {
            if cell.last_updated < tick
                && cell.state.is_known()
                && cell.state != CellState::Explored
            {
                cell.decay(rate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> WorldModel {
        WorldModel::new(&GridConfig::default(), WorldConfig::default())
    }

    fn forward_beam(range_m: f32, hit: bool) -> SensorReading {
        SensorReading {
            angle: 0.0,
            range_m,
            hit,
        }
    }

    #[test]
    fn test_beam_marks_free_and_obstacle() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();

        // Cells between robot and hit are free, hit cell is an obstacle
        let robot = m.grid().world_to_grid(pose.position()).unwrap();
        assert_eq!(m.grid().state(robot), CellState::Free);
        assert_eq!(
            m.grid().state(GridCoord::new(robot.x + 5, robot.y)),
            CellState::Free
        );
        assert_eq!(
            m.grid().state(GridCoord::new(robot.x + 10, robot.y)),
            CellState::Obstacle
        );
    }

    #[test]
    fn test_max_range_return_marks_no_obstacle() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        m.update_from_sensors(&pose, &[forward_beam(1.0, false)]).unwrap();

        let robot = m.grid().world_to_grid(pose.position()).unwrap();
        assert_eq!(
            m.grid().state(GridCoord::new(robot.x + 10, robot.y)),
            CellState::Free
        );
        assert_eq!(m.grid().counts().obstacle, 0);
    }

    #[test]
    fn test_pose_outside_grid_is_bridge_error() {
        let mut m = model();
        let pose = RobotPose::new(-1.0, 0.0, 0.0);
        let err = m.update_from_sensors(&pose, &[forward_beam(1.0, true)]);
        assert!(matches!(err, Err(NavError::BridgeConfiguration(_))));
    }

    #[test]
    fn test_explored_promotion() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        for _ in 0..8 {
            m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();
        }
        let robot = m.grid().world_to_grid(pose.position()).unwrap();
        let cell = m.grid().cell(robot).unwrap();
        assert_eq!(cell.state, CellState::Explored);
        assert!(cell.confidence >= EXPLORED_MIN_CONFIDENCE);

        // Further consistent observations keep the cell explored
        m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();
        assert_eq!(m.grid().state(robot), CellState::Explored);
    }

    #[test]
    fn test_correction_gate_order() {
        let mut m = model();
        let correction = |pos: [f32; 2], state: CellState, confidence: f32| Correction {
            pos_m: pos,
            observed_state: state,
            confidence,
        };

        // Below the confidence floor: skipped
        let outcome =
            m.apply_corrections(&[correction([1.0, 1.0], CellState::Obstacle, 0.5)], 0.6, 0.7);
        assert_eq!(outcome, CorrectionOutcome { applied: 0, skipped: 1 });

        // Valid correction on an unknown cell: applied, confidence clamped
        let outcome =
            m.apply_corrections(&[correction([1.0, 1.0], CellState::Obstacle, 0.95)], 0.6, 0.7);
        assert_eq!(outcome.applied, 1);
        let coord = m.grid().world_to_grid(WorldPoint::new(1.0, 1.0)).unwrap();
        let cell = m.grid().cell(coord).unwrap();
        assert_eq!(cell.state, CellState::Obstacle);
        assert!((cell.confidence - 0.7).abs() < 1e-6);

        // Existing confidence above the ceiling: refused
        m.grid_mut().cell_mut(coord).unwrap().confidence = 0.8;
        let outcome =
            m.apply_corrections(&[correction([1.0, 1.0], CellState::Free, 0.9)], 0.6, 0.7);
        assert_eq!(outcome.applied, 0);
        assert_eq!(m.grid().state(coord), CellState::Obstacle);
    }

    #[test]
    fn test_corrections_never_touch_explored() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        for _ in 0..8 {
            m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();
        }
        let robot = m.grid().world_to_grid(pose.position()).unwrap();
        assert_eq!(m.grid().state(robot), CellState::Explored);

        let outcome = m.apply_corrections(
            &[Correction {
                pos_m: [pose.x, pose.y],
                observed_state: CellState::Obstacle,
                confidence: 1.0,
            }],
            0.6,
            0.7,
        );
        assert_eq!(outcome.applied, 0);
        assert_eq!(m.grid().state(robot), CellState::Explored);
    }

    #[test]
    fn test_out_of_bounds_correction_skipped_not_fatal() {
        let mut m = model();
        let outcome = m.apply_corrections(
            &[Correction {
                pos_m: [99.0, 99.0],
                observed_state: CellState::Obstacle,
                confidence: 0.9,
            }],
            0.6,
            0.7,
        );
        assert_eq!(outcome, CorrectionOutcome { applied: 0, skipped: 1 });
    }

    #[test]
    fn test_frontier_detection() {
        let mut m = model();
        let pose = RobotPose::new(2.55, 2.55, 0.0);
        m.update_from_sensors(&pose, &[forward_beam(1.0, false)]).unwrap();

        let frontiers = m.find_frontiers();
        assert!(!frontiers.is_empty());
        // Every frontier is traversable and borders unknown
        for f in &frontiers {
            assert!(m.grid().state(*f).is_traversable());
            assert!(f
                .neighbors_4()
                .iter()
                .any(|n| m.grid().in_bounds(*n)
                    && m.grid().state(*n) == CellState::Unknown));
        }
    }

    #[test]
    fn test_decay_reduces_stale_confidence() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();
        let robot = m.grid().world_to_grid(pose.position()).unwrap();
        let obstacle = GridCoord::new(robot.x + 10, robot.y);
        let before = m.grid().cell(obstacle).unwrap().confidence;

        // Update with a beam pointing away; the obstacle cell goes stale
        let away = SensorReading {
            angle: std::f32::consts::PI,
            range_m: 0.3,
            hit: false,
        };
        m.update_from_sensors(&pose, &[away]).unwrap();
        let after = m.grid().cell(obstacle).unwrap().confidence;
        assert!(after < before);
        // State stays put, only confidence erodes
        assert_eq!(m.grid().state(obstacle), CellState::Obstacle);
    }

    #[test]
    fn test_serialize_full_then_patch() {
        let mut m = model();
        let pose = RobotPose::new(0.55, 2.55, 0.0);
        m.update_from_sensors(&pose, &[forward_beam(1.0, true)]).unwrap();

        let full = m
            .serialize(SnapshotFormat::Full, &pose, Some(WorldPoint::new(4.0, 4.0)))
            .unwrap();
        assert!(full.grid_json.contains("rle_full"));
        assert!(full.ascii.contains('R'));
        assert!(full.symbolic.contains("frontier_count"));

        // Nothing changed since the full snapshot: empty patch
        let patch = m
            .serialize(SnapshotFormat::Patch, &pose, None)
            .unwrap();
        assert!(patch.grid_json.contains("rle_patch"));
        assert!(patch.grid_json.contains("\"tokens\":[]"));
    }
}
