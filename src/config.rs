//! Configuration loading for ManasNav

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, Default)]
pub struct NavConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub candidates: CandidateConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Occupancy grid dimensions
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    /// Grid width in cells (default: 50)
    #[serde(default = "default_grid_width")]
    pub width: usize,

    /// Grid height in cells (default: 50)
    #[serde(default = "default_grid_height")]
    pub height: usize,

    /// Cell resolution in meters (default: 0.10)
    #[serde(default = "default_resolution")]
    pub resolution_m: f32,
}

/// Sensor fusion parameters
#[derive(Clone, Debug, Deserialize)]
pub struct WorldConfig {
    /// Per-cycle confidence decay for stale, unobserved cells (default: 0.01)
    #[serde(default = "default_confidence_decay")]
    pub confidence_decay: f32,

    /// Consistent observations before a free cell is certified explored (default: 5)
    #[serde(default = "default_explored_observations")]
    pub explored_observation_count: u16,

    /// Maximum usable sensor range in meters (default: 4.0)
    #[serde(default = "default_sensor_max_range")]
    pub sensor_max_range_m: f32,
}

/// Path planner parameters
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Traversal cost multiplier for unknown cells (default: 5.0; raise to
    /// ~50 when operating on vision-only world models)
    #[serde(default = "default_unknown_cell_cost")]
    pub unknown_cell_cost: f32,

    /// Obstacle inflation radius in meters, sized to the robot footprint
    /// (default: 0.15)
    #[serde(default = "default_inflation_radius")]
    pub inflation_radius_m: f32,

    /// Maximum A* iterations before giving up (default: 10000)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

/// Candidate generation weights and bounds
#[derive(Clone, Debug, Deserialize)]
pub struct CandidateConfig {
    /// Weight for inverse distance-to-goal
    #[serde(default = "default_w_goal")]
    pub w_goal: f32,

    /// Weight for minimum obstacle clearance
    #[serde(default = "default_w_clearance")]
    pub w_clearance: f32,

    /// Weight for nearby unexplored cells
    #[serde(default = "default_w_novelty")]
    pub w_novelty: f32,

    /// Weight for inverse planned-path cost
    #[serde(default = "default_w_feasibility")]
    pub w_feasibility: f32,

    /// Minimum candidates to emit when the map allows (default: 3)
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,

    /// Maximum candidates to emit (default: 5)
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Retreat distance for recovery candidates in meters (default: 0.5)
    #[serde(default = "default_recovery_retreat")]
    pub recovery_retreat_m: f32,
}

/// Navigation cycle parameters
#[derive(Clone, Debug, Deserialize)]
pub struct CycleConfig {
    /// Maximum cycles for a driver loop (default: 200)
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    /// Bounded history ring capacity (default: 5)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Consecutive low-movement cycles before the robot counts as stuck
    /// (default: 5)
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,

    /// Goal arrival tolerance in meters, boundary inclusive (default: 0.3)
    #[serde(default = "default_goal_tolerance")]
    pub goal_tolerance_m: f32,

    /// Render a raster map image for multimodal inference (default: true)
    #[serde(default = "default_generate_map_images")]
    pub generate_map_images: bool,

    /// Inference deadline in milliseconds (default: 5000)
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_ms: u64,

    /// Apply advisory world-model corrections from decisions (default: true)
    #[serde(default = "default_apply_corrections")]
    pub apply_llm_corrections: bool,

    /// Minimum proposed confidence for a correction to be considered
    /// (default: 0.6)
    #[serde(default = "default_correction_min_confidence")]
    pub llm_correction_min_confidence: f32,

    /// Existing-confidence ceiling above which corrections are refused, and
    /// the clamp applied to stored correction confidence (default: 0.7)
    #[serde(default = "default_correction_max_override")]
    pub llm_correction_max_override: f32,
}

/// Map render parameters
#[derive(Clone, Debug, Deserialize)]
pub struct RenderConfig {
    /// Pixels per grid cell (default: 8)
    #[serde(default = "default_cell_px")]
    pub cell_px: u32,
}

// Default value functions
fn default_grid_width() -> usize {
    50
}
fn default_grid_height() -> usize {
    50
}
fn default_resolution() -> f32 {
    0.10
}
fn default_confidence_decay() -> f32 {
    0.01
}
fn default_explored_observations() -> u16 {
    5
}
fn default_sensor_max_range() -> f32 {
    4.0
}
fn default_unknown_cell_cost() -> f32 {
    5.0
}
fn default_inflation_radius() -> f32 {
    0.15
}
fn default_max_iterations() -> usize {
    10000
}
fn default_w_goal() -> f32 {
    1.0
}
fn default_w_clearance() -> f32 {
    0.5
}
fn default_w_novelty() -> f32 {
    0.3
}
fn default_w_feasibility() -> f32 {
    0.5
}
fn default_min_candidates() -> usize {
    3
}
fn default_max_candidates() -> usize {
    5
}
fn default_recovery_retreat() -> f32 {
    0.5
}
fn default_max_cycles() -> u64 {
    200
}
fn default_max_history() -> usize {
    5
}
fn default_stuck_threshold() -> u32 {
    5
}
fn default_goal_tolerance() -> f32 {
    0.3
}
fn default_generate_map_images() -> bool {
    true
}
fn default_inference_timeout() -> u64 {
    5000
}
fn default_apply_corrections() -> bool {
    true
}
fn default_correction_min_confidence() -> f32 {
    0.6
}
fn default_correction_max_override() -> f32 {
    0.7
}
fn default_cell_px() -> u32 {
    8
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: default_grid_width(),
            height: default_grid_height(),
            resolution_m: default_resolution(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            confidence_decay: default_confidence_decay(),
            explored_observation_count: default_explored_observations(),
            sensor_max_range_m: default_sensor_max_range(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            unknown_cell_cost: default_unknown_cell_cost(),
            inflation_radius_m: default_inflation_radius(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            w_goal: default_w_goal(),
            w_clearance: default_w_clearance(),
            w_novelty: default_w_novelty(),
            w_feasibility: default_w_feasibility(),
            min_candidates: default_min_candidates(),
            max_candidates: default_max_candidates(),
            recovery_retreat_m: default_recovery_retreat(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
            max_history: default_max_history(),
            stuck_threshold: default_stuck_threshold(),
            goal_tolerance_m: default_goal_tolerance(),
            generate_map_images: default_generate_map_images(),
            inference_timeout_ms: default_inference_timeout(),
            apply_llm_corrections: default_apply_corrections(),
            llm_correction_min_confidence: default_correction_min_confidence(),
            llm_correction_max_override: default_correction_max_override(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            cell_px: default_cell_px(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::NavError::Config(format!("Failed to read config file: {}", e))
        })?;
        let config: NavConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
