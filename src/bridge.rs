//! World-model bridges: how observations reach the occupancy grid.
//!
//! A bridge owns the world model and feeds it on every pose update. The
//! navigation loop stays identical whether observations come from a
//! simulated lidar over a ground-truth map, a real range sensor, or a
//! vision detector.

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::config::{GridConfig, WorldConfig};
use crate::core::{CellState, GridCoord, RobotPose, WorldPoint};
use crate::error::{NavError, Result};
use crate::world::{cells_along_ray, SensorReading, WorldModel};

/// Source of observations for the navigation loop
pub trait WorldModelBridge {
    fn world_model(&self) -> &WorldModel;

    fn world_model_mut(&mut self) -> &mut WorldModel;

    /// Ingest whatever observations are pending for the given pose
    fn update_robot_pose(&mut self, pose: &RobotPose) -> Result<()>;

    /// Discard accumulated state and start from an unknown map
    fn reset(&mut self);
}

/// Lidar beams emitted per simulated scan
const SIM_BEAM_COUNT: usize = 36;

/// Uniform range noise amplitude in meters
const SIM_RANGE_NOISE_M: f32 = 0.02;

/// Simulates a range sensor over a known ground-truth map.
///
/// Each pose update casts a full beam sweep against the truth grid, adds
/// range noise, and fuses the readings like any real scan. The world model
/// still starts unknown; only the simulated sensor sees the truth.
pub struct GroundTruthBridge {
    world: WorldModel,
    truth: Vec<CellState>,
    width: usize,
    height: usize,
    resolution: f32,
    max_range_m: f32,
    rng: StdRng,
}

impl GroundTruthBridge {
    pub fn new(
        grid: &GridConfig,
        world_config: WorldConfig,
        truth: Vec<CellState>,
        seed: u64,
    ) -> Result<Self> {
        if truth.len() != grid.width * grid.height {
            return Err(NavError::BridgeConfiguration(format!(
                "truth map has {} cells, grid needs {}",
                truth.len(),
                grid.width * grid.height
            )));
        }
        Ok(Self {
            max_range_m: world_config.sensor_max_range_m,
            world: WorldModel::new(grid, world_config),
            truth,
            width: grid.width,
            height: grid.height,
            resolution: grid.resolution_m,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Is a world position free in the ground truth?
    pub fn truth_free(&self, point: WorldPoint) -> bool {
        self.truth_state_at(point)
            .map(|s| s != CellState::Obstacle)
            .unwrap_or(false)
    }

    fn truth_state_at(&self, point: WorldPoint) -> Option<CellState> {
        let x = (point.x / self.resolution).floor() as i32;
        let y = (point.y / self.resolution).floor() as i32;
        self.truth_state(GridCoord::new(x, y))
    }

    fn truth_state(&self, coord: GridCoord) -> Option<CellState> {
        if coord.x < 0
            || coord.y < 0
            || coord.x as usize >= self.width
            || coord.y as usize >= self.height
        {
            return None;
        }
        Some(self.truth[coord.y as usize * self.width + coord.x as usize])
    }

    /// Cast one beam against the truth map, returning (range, hit)
    fn cast_beam(&self, pose: &RobotPose, angle: f32) -> (f32, bool) {
        let origin = pose.position();
        let start = GridCoord::new(
            (origin.x / self.resolution).floor() as i32,
            (origin.y / self.resolution).floor() as i32,
        );
        let endpoint = origin.point_at(angle, self.max_range_m);
        let end = GridCoord::new(
            (endpoint.x / self.resolution).floor() as i32,
            (endpoint.y / self.resolution).floor() as i32,
        );

        for coord in cells_along_ray(start, end) {
            match self.truth_state(coord) {
                Some(CellState::Obstacle) => {
                    let center = WorldPoint::new(
                        (coord.x as f32 + 0.5) * self.resolution,
                        (coord.y as f32 + 0.5) * self.resolution,
                    );
                    return (origin.distance(&center), true);
                }
                Some(_) => {}
                // Beam left the map: treat like a max-range return
                None => break,
            }
        }
        (self.max_range_m, false)
    }
}

impl WorldModelBridge for GroundTruthBridge {
    fn world_model(&self) -> &WorldModel {
        &self.world
    }

    fn world_model_mut(&mut self) -> &mut WorldModel {
        &mut self.world
    }

    fn update_robot_pose(&mut self, pose: &RobotPose) -> Result<()> {
        let mut readings = Vec::with_capacity(SIM_BEAM_COUNT);
        for i in 0..SIM_BEAM_COUNT {
            let relative = i as f32 * std::f32::consts::TAU / SIM_BEAM_COUNT as f32;
            let (range, hit) = self.cast_beam(pose, pose.yaw + relative);
            let noise = self.rng.gen_range(-SIM_RANGE_NOISE_M..=SIM_RANGE_NOISE_M);
            readings.push(SensorReading {
                angle: relative,
                range_m: (range + noise).max(self.resolution),
                hit,
            });
        }
        let stats = self.world.update_from_sensors(pose, &readings)?;
        debug!(rays = stats.rays, changed = stats.cells_changed, "simulated scan fused");
        Ok(())
    }

    fn reset(&mut self) {
        self.world.reset();
    }
}

/// Fuses scans pushed by an external range-sensor driver
pub struct SensorBridge {
    world: WorldModel,
    pending: Vec<SensorReading>,
}

impl SensorBridge {
    pub fn new(grid: &GridConfig, world_config: WorldConfig) -> Self {
        Self {
            world: WorldModel::new(grid, world_config),
            pending: Vec::new(),
        }
    }

    /// Queue a scan for the next pose update
    pub fn push_scan(&mut self, readings: Vec<SensorReading>) {
        self.pending.extend(readings);
    }
}

impl WorldModelBridge for SensorBridge {
    fn world_model(&self) -> &WorldModel {
        &self.world
    }

    fn world_model_mut(&mut self) -> &mut WorldModel {
        &mut self.world
    }

    fn update_robot_pose(&mut self, pose: &RobotPose) -> Result<()> {
        let readings = std::mem::take(&mut self.pending);
        self.world.update_from_sensors(pose, &readings)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.world.reset();
    }
}

/// One detection from a vision pipeline
#[derive(Clone, Debug)]
pub struct Detection {
    /// Detected position in world meters
    pub pos_m: [f32; 2],
    pub state: CellState,
    pub confidence: f32,
}

/// One processed camera frame
#[derive(Clone, Debug, Default)]
pub struct VisionFrame {
    pub detections: Vec<Detection>,
    /// Raw encoded frame, forwarded to multimodal inference
    pub jpeg: Option<Vec<u8>>,
}

/// Builds the world model from vision detections instead of range scans.
///
/// Detections are sparse, so loops running on this bridge should raise
/// `unknown_cell_cost` to keep the planner out of unobserved space.
pub struct VisionBridge {
    world: WorldModel,
    pending: Vec<VisionFrame>,
    last_frame_jpeg: Option<Vec<u8>>,
}

impl VisionBridge {
    pub fn new(grid: &GridConfig, world_config: WorldConfig) -> Self {
        Self {
            world: WorldModel::new(grid, world_config),
            pending: Vec::new(),
            last_frame_jpeg: None,
        }
    }

    /// Queue a processed frame for the next pose update
    pub fn push_frame(&mut self, frame: VisionFrame) {
        self.pending.push(frame);
    }

    /// Most recent raw camera frame, for the decision frame's image slot
    pub fn last_frame_jpeg(&self) -> Option<&[u8]> {
        self.last_frame_jpeg.as_deref()
    }
}

impl WorldModelBridge for VisionBridge {
    fn world_model(&self) -> &WorldModel {
        &self.world
    }

    fn world_model_mut(&mut self) -> &mut WorldModel {
        &mut self.world
    }

    fn update_robot_pose(&mut self, pose: &RobotPose) -> Result<()> {
        // Empty scan advances the cycle stamp and validates the pose
        self.world.update_from_sensors(pose, &[])?;
        for frame in self.pending.drain(..) {
            for d in &frame.detections {
                self.world.observe_point(
                    WorldPoint::new(d.pos_m[0], d.pos_m[1]),
                    d.state,
                    d.confidence,
                );
            }
            if frame.jpeg.is_some() {
                self.last_frame_jpeg = frame.jpeg;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.last_frame_jpeg = None;
        self.world.reset();
    }
}

/// Build a truth map from character rows, top row first.
/// `#` is an obstacle, anything else is free.
pub fn truth_from_ascii(rows: &[&str]) -> Vec<CellState> {
    let height = rows.len();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut truth = vec![CellState::Free; width * height];
    for (row_idx, row) in rows.iter().enumerate() {
        // Row 0 of the input is the top of the map (highest y)
        let y = height - 1 - row_idx;
        for (x, ch) in row.chars().enumerate() {
            if ch == '#' {
                truth[y * width + x] = CellState::Obstacle;
            }
        }
    }
    truth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> GridConfig {
        GridConfig {
            width: 20,
            height: 20,
            resolution_m: 0.10,
        }
    }

    fn walled_truth() -> Vec<CellState> {
        let mut rows: Vec<String> = Vec::new();
        for y in 0..20 {
            let mut row = String::new();
            for x in 0..20 {
                let edge = x == 0 || y == 0 || x == 19 || y == 19;
                row.push(if edge { '#' } else { '.' });
            }
            rows.push(row);
        }
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        truth_from_ascii(&refs)
    }

    #[test]
    fn test_truth_dimension_mismatch_rejected() {
        let result = GroundTruthBridge::new(
            &small_grid(),
            WorldConfig::default(),
            vec![CellState::Free; 10],
            7,
        );
        assert!(matches!(result, Err(NavError::BridgeConfiguration(_))));
    }

    #[test]
    fn test_simulated_scan_discovers_walls() {
        let mut bridge =
            GroundTruthBridge::new(&small_grid(), WorldConfig::default(), walled_truth(), 7)
                .unwrap();
        let pose = RobotPose::new(1.0, 1.0, 0.0);
        bridge.update_robot_pose(&pose).unwrap();

        let counts = bridge.world_model().grid().counts();
        assert!(counts.free > 0);
        assert!(counts.obstacle > 0);
        // The model only knows what the beams saw
        assert!(counts.unknown > 0);
    }

    #[test]
    fn test_truth_free_checks() {
        let bridge =
            GroundTruthBridge::new(&small_grid(), WorldConfig::default(), walled_truth(), 7)
                .unwrap();
        assert!(bridge.truth_free(WorldPoint::new(1.0, 1.0)));
        assert!(!bridge.truth_free(WorldPoint::new(0.05, 1.0)));
        assert!(!bridge.truth_free(WorldPoint::new(-1.0, 1.0)));
    }

    #[test]
    fn test_sensor_bridge_drains_pending() {
        let mut bridge = SensorBridge::new(&small_grid(), WorldConfig::default());
        bridge.push_scan(vec![SensorReading {
            angle: 0.0,
            range_m: 0.5,
            hit: true,
        }]);
        let pose = RobotPose::new(1.0, 1.0, 0.0);
        bridge.update_robot_pose(&pose).unwrap();
        assert!(bridge.world_model().grid().counts().obstacle > 0);

        // Second update has nothing queued and changes no states
        bridge.update_robot_pose(&pose).unwrap();
        assert_eq!(bridge.world_model().grid().counts().obstacle, 1);
    }

    #[test]
    fn test_vision_bridge_applies_detections() {
        let mut bridge = VisionBridge::new(&small_grid(), WorldConfig::default());
        bridge.push_frame(VisionFrame {
            detections: vec![Detection {
                pos_m: [1.5, 1.5],
                state: CellState::Obstacle,
                confidence: 0.8,
            }],
            jpeg: Some(vec![0xFF, 0xD8]),
        });
        let pose = RobotPose::new(1.0, 1.0, 0.0);
        bridge.update_robot_pose(&pose).unwrap();

        let coord = bridge
            .world_model()
            .grid()
            .world_to_grid(WorldPoint::new(1.5, 1.5))
            .unwrap();
        assert_eq!(bridge.world_model().grid().state(coord), CellState::Obstacle);
        assert!(bridge.last_frame_jpeg().is_some());
    }

    #[test]
    fn test_truth_from_ascii_orientation() {
        let truth = truth_from_ascii(&["#.", ".."]);
        // Top-left '#' lands at (0, 1)
        assert_eq!(truth[1 * 2 + 0], CellState::Obstacle);
        assert_eq!(truth[0], CellState::Free);
    }
}
