//! Candidate subgoal generation.
//!
//! The decision maker never receives raw coordinates to invent targets from.
//! It picks among a small ranked set of vetted positions, each scored for
//! goal progress, clearance, novelty, and path feasibility.

use serde::Serialize;
use tracing::debug;

use crate::config::CandidateConfig;
use crate::core::{CellState, RobotPose, WorldPoint};
use crate::planning::LocalPlanner;
use crate::world::WorldModel;

/// How a candidate was produced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// The mission goal itself, reachable by a planned path
    Subgoal,
    /// A frontier cell bordering unknown space
    Frontier,
    /// An intermediate waypoint partway along the goal path
    Waypoint,
    /// A retreat or backtrack position, offered when stuck
    Recovery,
}

/// A vetted target the decision maker may select by id
#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
    /// Stable id for this cycle (`"c1"`, `"c2"`, ...)
    pub id: String,
    pub kind: CandidateKind,
    /// Position in world meters
    pub pos_m: [f32; 2],
    pub score: f32,
    /// One-line rationale shown in the decision frame
    pub note: String,
}

impl Candidate {
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.pos_m[0], self.pos_m[1])
    }
}

struct Scored {
    kind: CandidateKind,
    pos: WorldPoint,
    score: f32,
    note: String,
}

/// Search window half-width (cells) for the novelty term
const NOVELTY_RADIUS: i32 = 2;

/// Clearance is normalized against this many meters
const CLEARANCE_CAP_M: f32 = 1.0;

pub struct CandidateGenerator {
    config: CandidateConfig,
}

impl CandidateGenerator {
    pub fn new(config: CandidateConfig) -> Self {
        Self { config }
    }

    /// Produce a bounded, ranked candidate set for the current cycle.
    ///
    /// Recovery candidates lead the list when the robot is stuck. The result
    /// is never empty while the robot stands on a valid cell: a hold-position
    /// candidate backstops an otherwise empty set.
    pub fn generate(
        &self,
        world: &WorldModel,
        planner: &LocalPlanner,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
        is_stuck: bool,
        trajectory: &[WorldPoint],
    ) -> Vec<Candidate> {
        let mut scored: Vec<Scored> = Vec::new();

        // Goal-directed candidates require a feasible path. An unreachable
        // goal degrades to frontier exploration instead of dead targets.
        if let Some(goal) = goal {
            let path = planner.plan_path_world(world.grid(), pose.position(), goal);
            if path.success {
                let feasibility = 1.0 / (1.0 + path.cost);
                scored.push(Scored {
                    kind: CandidateKind::Subgoal,
                    pos: goal,
                    score: self.score(world, pose, Some(goal), goal, feasibility),
                    note: "direct route to goal".to_string(),
                });
                // A nearer waypoint along the same path, when the goal is far
                let midpoint = path.step_toward(pose.position(), 1.0);
                if midpoint.distance(&goal) > 0.5 && midpoint.distance(&pose.position()) > 0.2 {
                    scored.push(Scored {
                        kind: CandidateKind::Waypoint,
                        pos: midpoint,
                        score: self.score(world, pose, Some(goal), midpoint, feasibility),
                        note: "waypoint along goal path".to_string(),
                    });
                }
            } else {
                debug!(error = ?path.error, "goal unreachable, offering frontiers only");
            }
        }

        scored.extend(self.frontier_candidates(world, planner, pose, goal));
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.max_candidates);

        let mut ordered: Vec<Scored> = Vec::new();
        if is_stuck {
            ordered.extend(self.recovery_candidates(world, pose, trajectory));
        }
        ordered.extend(scored);
        ordered.truncate(self.config.max_candidates);

        // Top up a thin set with short-range vetted waypoints so the
        // decision maker always has real alternatives where the map allows
        if ordered.len() < self.config.min_candidates {
            let mut extra = self.nearby_waypoints(world, planner, pose, goal, &ordered);
            extra.sort_by(|a, b| {
                b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
            });
            for s in extra {
                if ordered.len() >= self.config.min_candidates {
                    break;
                }
                ordered.push(s);
            }
        }

        if ordered.is_empty() {
            ordered.push(Scored {
                kind: CandidateKind::Recovery,
                pos: pose.position(),
                score: 0.0,
                note: "hold position".to_string(),
            });
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(i, s)| Candidate {
                id: format!("c{}", i + 1),
                kind: s.kind,
                pos_m: [s.pos.x, s.pos.y],
                score: s.score,
                note: s.note,
            })
            .collect()
    }

    fn frontier_candidates(
        &self,
        world: &WorldModel,
        planner: &LocalPlanner,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
    ) -> Vec<Scored> {
        let frontiers = world.find_frontiers();
        // Cheap pre-rank without planning, then verify the best few
        let mut pre: Vec<(WorldPoint, f32)> = frontiers
            .iter()
            .filter_map(|c| world.grid().grid_to_world(*c))
            .filter(|p| p.distance(&pose.position()) > 0.2)
            .map(|p| (p, self.score(world, pose, goal, p, 0.0)))
            .collect();
        pre.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pre.truncate(self.config.max_candidates * 2);

        let mut out = Vec::new();
        for (pos, _) in pre {
            if out.len() >= self.config.max_candidates {
                break;
            }
            let path = planner.plan_path_world(world.grid(), pose.position(), pos);
            if !path.success {
                continue;
            }
            let feasibility = 1.0 / (1.0 + path.cost);
            out.push(Scored {
                kind: CandidateKind::Frontier,
                pos,
                score: self.score(world, pose, goal, pos, feasibility),
                note: "frontier toward unexplored space".to_string(),
            });
        }
        out
    }

    /// Traversable, plannable positions one retreat-length out in the
    /// eight compass directions, skipping near-duplicates of existing
    /// candidates
    fn nearby_waypoints(
        &self,
        world: &WorldModel,
        planner: &LocalPlanner,
        pose: &RobotPose,
        goal: Option<WorldPoint>,
        existing: &[Scored],
    ) -> Vec<Scored> {
        let mut out: Vec<Scored> = Vec::new();
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::FRAC_PI_4;
            let pos = pose
                .position()
                .point_at(angle, self.config.recovery_retreat_m);
            let Some(coord) = world.grid().world_to_grid(pos) else {
                continue;
            };
            if !world.grid().state(coord).is_traversable() {
                continue;
            }
            if existing.iter().chain(out.iter()).any(|s| s.pos.distance(&pos) < 0.2) {
                continue;
            }
            let path = planner.plan_path_world(world.grid(), pose.position(), pos);
            if !path.success {
                continue;
            }
            let feasibility = 1.0 / (1.0 + path.cost);
            out.push(Scored {
                kind: CandidateKind::Waypoint,
                pos,
                score: self.score(world, pose, goal, pos, feasibility),
                note: "nearby reachable waypoint".to_string(),
            });
        }
        out
    }

    /// Retreat and backtrack positions offered when the robot is stuck
    fn recovery_candidates(
        &self,
        world: &WorldModel,
        pose: &RobotPose,
        trajectory: &[WorldPoint],
    ) -> Vec<Scored> {
        let mut out = Vec::new();

        let retreat = pose
            .position()
            .point_at(pose.yaw + std::f32::consts::PI, self.config.recovery_retreat_m);
        if world
            .grid()
            .world_to_grid(retreat)
            .map(|c| world.grid().state(c) != CellState::Obstacle)
            .unwrap_or(false)
        {
            out.push(Scored {
                kind: CandidateKind::Recovery,
                pos: retreat,
                score: 0.0,
                note: "retreat away from heading".to_string(),
            });
        }

        // Backtrack to the most recent trajectory point a retreat-length away
        if let Some(back) = trajectory
            .iter()
            .rev()
            .find(|p| p.distance(&pose.position()) >= self.config.recovery_retreat_m)
        {
            out.push(Scored {
                kind: CandidateKind::Recovery,
                pos: *back,
                score: 0.0,
                note: "backtrack along trajectory".to_string(),
            });
        }

        out
    }

    /// score = w_goal * 1/(1+d_goal) + w_clearance * clearance
    ///       + w_novelty * unknown_fraction + w_feasibility * 1/(1+path_cost)
    fn score(
        &self,
        world: &WorldModel,
        _pose: &RobotPose,
        goal: Option<WorldPoint>,
        pos: WorldPoint,
        feasibility: f32,
    ) -> f32 {
        let c = &self.config;

        let goal_term = goal
            .map(|g| 1.0 / (1.0 + pos.distance(&g)))
            .unwrap_or(0.0);

        let (clearance, novelty) = match world.grid().world_to_grid(pos) {
            Some(coord) => {
                let clearance = world
                    .nearest_obstacle_distance(coord, CLEARANCE_CAP_M)
                    .min(CLEARANCE_CAP_M)
                    / CLEARANCE_CAP_M;
                let window = (2 * NOVELTY_RADIUS + 1).pow(2) as f32;
                let novelty = world.count_unknown_near(coord, NOVELTY_RADIUS) as f32 / window;
                (clearance, novelty)
            }
            None => (0.0, 0.0),
        };

        c.w_goal * goal_term
            + c.w_clearance * clearance
            + c.w_novelty * novelty
            + c.w_feasibility * feasibility
    }
}
