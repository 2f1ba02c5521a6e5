//! ManasNav: an LLM-in-the-loop navigation controller for
//! differential-drive robots.
//!
//! The control stack keeps a probabilistic occupancy map, generates a small
//! set of vetted candidate subgoals each cycle, and asks a language model to
//! pick among them. Every decision is validated defensively: responses are
//! schema-checked, carry a mandatory fallback, and proposed map corrections
//! pass a confidence gate before touching the grid. Classical A* planning
//! over the inflated map does the actual path work; the model only chooses
//! where to go next.
//!
//! Observation sources plug in behind [`bridge::WorldModelBridge`]:
//! a simulated lidar over a ground-truth map, pushed range scans, or vision
//! detections all feed the same [`world::WorldModel`].

pub mod bridge;
pub mod candidates;
pub mod config;
pub mod core;
pub mod decision;
pub mod error;
pub mod inference;
pub mod nav;
pub mod planning;
pub mod render;
pub mod world;

pub use crate::bridge::{GroundTruthBridge, SensorBridge, VisionBridge, WorldModelBridge};
pub use crate::candidates::{Candidate, CandidateGenerator, CandidateKind};
pub use crate::config::NavConfig;
pub use crate::core::{CellState, GridCoord, RobotPose, WorldPoint};
pub use crate::decision::{parse_decision, Action, FallbackAction, NavDecision};
pub use crate::error::{NavError, Result};
pub use crate::inference::{InferenceClient, InferenceRequest, MockInference};
pub use crate::nav::{CycleResult, NavMode, Navigator};
pub use crate::planning::{LocalPlanner, PathResult};
pub use crate::world::{SensorReading, WorldModel};
