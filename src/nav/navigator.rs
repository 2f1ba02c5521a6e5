//! The navigation cycle driver.
//!
//! Each cycle fuses sensors, generates candidates, asks the decision maker
//! to pick one, validates the answer, and plans a path. Failures inside a
//! cycle degrade to the decision's own fallback; only a misconfigured
//! bridge aborts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bridge::WorldModelBridge;
use crate::candidates::{Candidate, CandidateGenerator, CandidateKind};
use crate::config::NavConfig;
use crate::core::{RobotPose, WorldPoint};
use crate::decision::{parse_decision, Action, Fallback, FallbackAction, NavDecision};
use crate::error::{NavError, Result};
use crate::inference::{complete_with_deadline, InferenceClient, InferenceRequest};
use crate::planning::{LocalPlanner, PathResult};
use crate::render::MapRenderer;
use crate::world::{SnapshotFormat, WorldSnapshot};

use super::state::{HistoryEntry, NavMode, NavigationState};

/// Confidence shift for a valid decision
const CONFIDENCE_VALID: f32 = 0.1;
/// Confidence shift when the response fails to parse
const CONFIDENCE_PARSE_FAIL: f32 = -0.2;
/// Confidence shift when inference misses the deadline or errors outright
const CONFIDENCE_INFERENCE_FAIL: f32 = -0.3;

/// Fallback promotions attempted before forcing a stop
const MAX_FALLBACK_ATTEMPTS: usize = 3;

/// Recent positions kept for backtrack recovery
const TRAJECTORY_CAP: usize = 512;

/// A full snapshot is sent every this many cycles; patches in between
const FULL_SNAPSHOT_INTERVAL: u64 = 10;

/// Instructions given to the decision maker on every request
pub const SYSTEM_PROMPT: &str = "\
You drive a differential-drive robot on an occupancy grid. Each message \
shows the current map, the robot pose, the goal if one is set, and a short \
list of vetted candidate targets with ids like \"c1\".

Respond with a single JSON object and nothing else:
{
  \"action\": {\"type\": \"MOVE_TO\" | \"EXPLORE\" | \"ROTATE_TO\" | \"FOLLOW_WALL\" | \"STOP\", \
\"target_id\": \"c1\"},
  \"fallback\": {\"if_failed\": \"EXPLORE\" | \"ROTATE_TO\" | \"STOP\"},
  \"world_model_update\": {\"corrections\": [{\"pos_m\": [x, y], \
\"observed_state\": \"free\" | \"obstacle\" | \"unknown\", \"confidence\": 0.0}]},
  \"explanation\": \"one sentence\"
}

Rules: prefer a candidate id over raw coordinates. The fallback field is \
mandatory. Corrections are advisory and may be rejected. Choose STOP only \
when no candidate is worth pursuing.";

/// Outcome of one navigation cycle
#[derive(Clone, Debug, Serialize)]
pub struct CycleResult {
    pub cycle: u64,
    /// The decision that was actually executed, after any fallback
    /// replacement
    pub decision: NavDecision,
    /// Planned path for motion actions
    pub path: Option<PathResult>,
    pub mode: NavMode,
    pub is_stuck: bool,
    pub goal_reached: bool,
    pub elapsed_ms: u64,
}

/// Owns the cycle loop and everything it coordinates
pub struct Navigator {
    config: NavConfig,
    bridge: Box<dyn WorldModelBridge>,
    inference: Arc<dyn InferenceClient>,
    generator: CandidateGenerator,
    planner: LocalPlanner,
    renderer: MapRenderer,
    state: NavigationState,
    pose: RobotPose,
    goal: Option<WorldPoint>,
    goal_text: Option<String>,
    trajectory: Vec<WorldPoint>,
}

impl Navigator {
    pub fn new(
        config: NavConfig,
        bridge: Box<dyn WorldModelBridge>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            generator: CandidateGenerator::new(config.candidates.clone()),
            planner: LocalPlanner::new(config.planner.clone()),
            renderer: MapRenderer::new(config.render.cell_px),
            state: NavigationState::new(config.cycle.max_history),
            config,
            bridge,
            inference,
            pose: RobotPose::default(),
            goal: None,
            goal_text: None,
            trajectory: Vec::new(),
        }
    }

    /// Run one full navigation cycle.
    ///
    /// `camera_jpeg` is forwarded to multimodal inference when present.
    /// Inference, parsing, and planning failures are absorbed into fallback
    /// behavior; only a bridge configuration error propagates.
    pub fn run_cycle(&mut self, camera_jpeg: Option<Vec<u8>>) -> Result<CycleResult> {
        let started = Instant::now();
        self.state.cycle += 1;
        let cycle = self.state.cycle;

        // Arrival check before spending an inference round trip
        if let Some(goal) = self.goal {
            if self.pose.distance_to(&goal) <= self.config.cycle.goal_tolerance_m {
                info!(cycle, "goal reached");
                self.state.mode = NavMode::GoalReached;
                let decision = NavDecision {
                    action: Action::Stop,
                    fallback: Fallback {
                        if_failed: FallbackAction::Stop,
                        target_id: None,
                    },
                    world_model_update: None,
                    explanation: "goal reached".to_string(),
                };
                return Ok(CycleResult {
                    cycle,
                    decision,
                    path: None,
                    mode: NavMode::GoalReached,
                    is_stuck: false,
                    goal_reached: true,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
        }

        // Sensor ingest. A bridge failure is a setup defect and aborts.
        self.bridge.update_robot_pose(&self.pose)?;

        self.state
            .record_movement(self.pose.position(), self.config.cycle.stuck_threshold);
        if self.state.is_stuck {
            warn!(
                cycle,
                counter = self.state.stuck_counter,
                "no progress, entering recovery"
            );
            self.state.mode = NavMode::Recovering;
        }

        let candidates = self.generator.generate(
            self.bridge.world_model(),
            &self.planner,
            &self.pose,
            self.goal,
            self.state.is_stuck,
            &self.trajectory,
        );

        // Full snapshots periodically re-baseline the patch stream
        let format = if cycle % FULL_SNAPSHOT_INTERVAL == 1 {
            SnapshotFormat::Full
        } else {
            SnapshotFormat::Patch
        };
        let snapshot = self
            .bridge
            .world_model_mut()
            .serialize(format, &self.pose, self.goal)?;

        let user_message = self.build_frame(&snapshot, &candidates)?;
        let mut images = Vec::new();
        if self.config.cycle.generate_map_images {
            match self
                .renderer
                .render_png(self.bridge.world_model(), &self.pose, self.goal, &candidates)
            {
                Ok(png) => images.push(png),
                Err(e) => warn!(cycle, error = %e, "map render failed, sending text only"),
            }
        }
        if let Some(jpeg) = camera_jpeg {
            images.push(jpeg);
        }

        let request = InferenceRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_message,
            images,
        };
        let timeout = Duration::from_millis(self.config.cycle.inference_timeout_ms);
        let mut decision =
            match complete_with_deadline(Arc::clone(&self.inference), request, timeout) {
                Ok(raw) => match parse_decision(&raw) {
                    Ok(decision) => {
                        self.state.adjust_confidence(CONFIDENCE_VALID);
                        decision
                    }
                    Err(e) => {
                        warn!(cycle, error = %e, "unparseable decision, exploring");
                        self.state.adjust_confidence(CONFIDENCE_PARSE_FAIL);
                        NavDecision::fallback_explore()
                    }
                },
                Err(NavError::InferenceTimeout(ms)) => {
                    warn!(cycle, timeout_ms = ms, "inference deadline missed, exploring");
                    self.state.adjust_confidence(CONFIDENCE_INFERENCE_FAIL);
                    NavDecision::fallback_explore()
                }
                Err(e) => {
                    warn!(cycle, error = %e, "inference failed, exploring");
                    self.state.adjust_confidence(CONFIDENCE_INFERENCE_FAIL);
                    NavDecision::fallback_explore()
                }
            };

        if self.config.cycle.apply_llm_corrections {
            if let Some(update) = decision.world_model_update.clone() {
                let outcome = self.bridge.world_model_mut().apply_corrections(
                    &update.corrections,
                    self.config.cycle.llm_correction_min_confidence,
                    self.config.cycle.llm_correction_max_override,
                );
                debug!(
                    cycle,
                    applied = outcome.applied,
                    skipped = outcome.skipped,
                    "processed corrections"
                );
            }
        }

        // Resolve the target and plan; a failure promotes the fallback.
        // The chain terminates because promoted fallbacks end at STOP.
        let mut path = None;
        let mut resolved = false;
        for _ in 0..MAX_FALLBACK_ATTEMPTS {
            match self.resolve_and_plan(&decision, &candidates) {
                Ok(p) => {
                    path = p;
                    resolved = true;
                    break;
                }
                Err(e) => {
                    warn!(cycle, error = %e, "action not executable, using fallback");
                    decision = NavDecision::from_fallback(&decision.fallback);
                }
            }
        }
        if !resolved {
            decision = NavDecision {
                action: Action::Stop,
                fallback: Fallback {
                    if_failed: FallbackAction::Stop,
                    target_id: None,
                },
                world_model_update: None,
                explanation: "no executable action, stopping".to_string(),
            };
        }

        self.state.mode = mode_for(&decision.action);

        self.trajectory.push(self.pose.position());
        if self.trajectory.len() > TRAJECTORY_CAP {
            self.trajectory.remove(0);
        }
        let success = resolved && path.as_ref().map(|p: &PathResult| p.success).unwrap_or(true);
        self.state.push_history(HistoryEntry {
            cycle,
            action: decision.action.clone(),
            mode: self.state.mode,
            position: [self.pose.x, self.pose.y],
            success,
        });

        debug!(cycle, mode = ?self.state.mode, confidence = self.state.confidence, "cycle complete");
        Ok(CycleResult {
            cycle,
            decision,
            path,
            mode: self.state.mode,
            is_stuck: self.state.is_stuck,
            goal_reached: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Turn a decision into a planned path, or fail so the fallback runs.
    /// Non-motion actions resolve with no path.
    fn resolve_and_plan(
        &self,
        decision: &NavDecision,
        candidates: &[Candidate],
    ) -> Result<Option<PathResult>> {
        let target = match &decision.action {
            Action::MoveTo {
                target_id,
                target_m,
            } => match (target_id, target_m) {
                (Some(id), _) => Some(
                    candidates
                        .iter()
                        .find(|c| &c.id == id)
                        .map(Candidate::position)
                        .ok_or_else(|| {
                            NavError::Planning(format!("unknown target id {id}"))
                        })?,
                ),
                (None, Some(m)) => Some(WorldPoint::new(m[0], m[1])),
                (None, None) => {
                    return Err(NavError::Planning("MOVE_TO without a target".to_string()))
                }
            },
            Action::Explore { target_id } => {
                let candidate = match target_id {
                    Some(id) => candidates.iter().find(|c| &c.id == id),
                    None => candidates
                        .iter()
                        .find(|c| c.kind == CandidateKind::Frontier)
                        .or_else(|| {
                            candidates.iter().find(|c| c.kind != CandidateKind::Recovery)
                        }),
                };
                Some(
                    candidate
                        .map(Candidate::position)
                        .ok_or_else(|| {
                            NavError::Planning("no explorable candidate".to_string())
                        })?,
                )
            }
            Action::RotateTo { .. } | Action::FollowWall | Action::Stop => None,
        };

        match target {
            Some(target) => {
                let path = self.planner.plan_path_world(
                    self.bridge.world_model().grid(),
                    self.pose.position(),
                    target,
                );
                if path.success {
                    Ok(Some(path))
                } else {
                    Err(NavError::Planning(
                        path.error.unwrap_or_else(|| "planning failed".to_string()),
                    ))
                }
            }
            None => Ok(None),
        }
    }

    /// Decision frame body: world views, candidates, recent history
    fn build_frame(&self, snapshot: &WorldSnapshot, candidates: &[Candidate]) -> Result<String> {
        let grid: serde_json::Value = serde_json::from_str(&snapshot.grid_json)?;
        let summary: serde_json::Value = serde_json::from_str(&snapshot.symbolic)?;
        let history: Vec<&HistoryEntry> = self.state.history().collect();

        let frame = serde_json::json!({
            "cycle": self.state.cycle,
            "mode": self.state.mode,
            "pose": { "x": self.pose.x, "y": self.pose.y, "yaw": self.pose.yaw },
            "speed": self.state.speed,
            "battery": self.state.battery,
            "goal": self.goal,
            "goal_text": self.goal_text,
            "is_stuck": self.state.is_stuck,
            "candidates": candidates,
            "map": grid,
            "summary": summary,
            "ascii_map": snapshot.ascii,
            "history": history,
        });
        Ok(serde_json::to_string(&frame)?)
    }

    pub fn set_goal(&mut self, goal: WorldPoint, text: Option<String>) {
        self.goal = Some(goal);
        self.goal_text = text;
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
        self.goal_text = None;
    }

    pub fn goal(&self) -> Option<WorldPoint> {
        self.goal
    }

    pub fn is_goal_reached(&self) -> bool {
        self.state.mode == NavMode::GoalReached
    }

    pub fn set_pose(&mut self, pose: RobotPose) {
        self.pose = pose;
    }

    pub fn pose(&self) -> RobotPose {
        self.pose
    }

    /// Update telemetry echoed into decision frames
    pub fn set_telemetry(&mut self, speed: f32, battery: f32) {
        self.state.speed = speed;
        self.state.battery = battery.clamp(0.0, 1.0);
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn bridge(&self) -> &dyn WorldModelBridge {
        self.bridge.as_ref()
    }

    pub fn bridge_mut(&mut self) -> &mut dyn WorldModelBridge {
        self.bridge.as_mut()
    }

    pub fn renderer(&self) -> &MapRenderer {
        &self.renderer
    }
}

/// Operating mode implied by an executed action
fn mode_for(action: &Action) -> NavMode {
    match action {
        Action::MoveTo { .. } => NavMode::Navigating,
        Action::Explore { .. } => NavMode::Exploring,
        Action::RotateTo { .. } => NavMode::Recovering,
        Action::FollowWall => NavMode::AvoidingObstacle,
        Action::Stop => NavMode::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_for_actions() {
        assert_eq!(
            mode_for(&Action::MoveTo {
                target_id: Some("c1".to_string()),
                target_m: None
            }),
            NavMode::Navigating
        );
        assert_eq!(
            mode_for(&Action::Explore { target_id: None }),
            NavMode::Exploring
        );
        assert_eq!(mode_for(&Action::RotateTo { yaw_deg: None }), NavMode::Recovering);
        assert_eq!(mode_for(&Action::FollowWall), NavMode::AvoidingObstacle);
        assert_eq!(mode_for(&Action::Stop), NavMode::Idle);
    }
}
