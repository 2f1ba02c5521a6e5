//! Simulation driver: runs the navigation loop over a ground-truth map
//! with a scripted decision maker standing in for a live model.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use manas_nav::bridge::{truth_from_ascii, GroundTruthBridge};
use manas_nav::config::NavConfig;
use manas_nav::core::{normalize_angle, RobotPose, WorldPoint};
use manas_nav::error::Result;
use manas_nav::inference::{InferenceRequest, MockInference};
use manas_nav::nav::{NavMode, Navigator};

struct Args {
    config: Option<PathBuf>,
    goal: WorldPoint,
    map_out: PathBuf,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        goal: WorldPoint::new(4.0, 4.0),
        map_out: PathBuf::from("map.png"),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = iter.next().map(PathBuf::from),
            "--goal" => {
                if let Some(value) = iter.next() {
                    if let Some((x, y)) = value.split_once(',') {
                        if let (Ok(x), Ok(y)) = (x.trim().parse(), y.trim().parse()) {
                            args.goal = WorldPoint::new(x, y);
                        }
                    }
                }
            }
            "--map-out" => {
                if let Some(value) = iter.next() {
                    args.map_out = PathBuf::from(value);
                }
            }
            _ => {}
        }
    }
    args
}

/// A 5 m square room with an L-shaped interior wall
fn demo_truth(width: usize, height: usize) -> Vec<manas_nav::CellState> {
    let mut rows = Vec::with_capacity(height);
    for row_idx in 0..height {
        let y = height - 1 - row_idx;
        let mut row = String::with_capacity(width);
        for x in 0..width {
            let edge = x == 0 || y == 0 || x == width - 1 || y == height - 1;
            let wall_v = x == width / 2 && y > height / 4 && y < 3 * height / 4;
            let wall_h = y == height / 2 && x > width / 2 && x < 3 * width / 4;
            row.push(if edge || wall_v || wall_h { '#' } else { '.' });
        }
        rows.push(row);
    }
    let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
    truth_from_ascii(&refs)
}

/// Scripted decision maker: picks the candidate closest to the goal
fn scripted_client() -> MockInference {
    MockInference::with(|request: &InferenceRequest| {
        let frame: serde_json::Value = match serde_json::from_str(&request.user_message) {
            Ok(v) => v,
            Err(_) => return r#"{"action":{"type":"STOP"},"fallback":{"if_failed":"STOP"}}"#.into(),
        };
        let goal = frame.get("goal").and_then(|g| {
            Some((
                g.get("x")?.as_f64()? as f32,
                g.get("y")?.as_f64()? as f32,
            ))
        });
        let candidates = frame
            .get("candidates")
            .and_then(|c| c.as_array())
            .cloned()
            .unwrap_or_default();

        let best = candidates
            .iter()
            .filter_map(|c| {
                let id = c.get("id")?.as_str()?;
                let pos = c.get("pos_m")?.as_array()?;
                let x = pos.first()?.as_f64()? as f32;
                let y = pos.get(1)?.as_f64()? as f32;
                let rank = match goal {
                    Some((gx, gy)) => ((x - gx).powi(2) + (y - gy).powi(2)).sqrt(),
                    None => 0.0,
                };
                Some((id.to_string(), rank))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((id, _)) => format!(
                r#"{{"action":{{"type":"MOVE_TO","target_id":"{id}"}},"fallback":{{"if_failed":"EXPLORE"}},"explanation":"heading for the candidate nearest the goal"}}"#
            ),
            None => r#"{"action":{"type":"EXPLORE"},"fallback":{"if_failed":"STOP"}}"#.into(),
        }
    })
}

fn run() -> Result<()> {
    let args = parse_args();
    let config = match &args.config {
        Some(path) => NavConfig::load(path)?,
        None => NavConfig::default(),
    };

    let truth = demo_truth(config.grid.width, config.grid.height);
    let bridge = GroundTruthBridge::new(&config.grid, config.world.clone(), truth, 42)?;
    let max_cycles = config.cycle.max_cycles;

    let mut navigator = Navigator::new(config, Box::new(bridge), Arc::new(scripted_client()));
    navigator.set_pose(RobotPose::new(0.5, 0.5, 0.0));
    navigator.set_goal(args.goal, Some("demo goal".to_string()));
    info!(goal_x = args.goal.x, goal_y = args.goal.y, "starting simulation");

    let step_m = 0.25;
    for _ in 0..max_cycles {
        let result = navigator.run_cycle(None)?;
        info!(
            cycle = result.cycle,
            mode = ?result.mode,
            stuck = result.is_stuck,
            "cycle done"
        );

        if result.goal_reached {
            info!(cycle = result.cycle, "arrived at goal");
            break;
        }

        // Advance the simulated robot along the planned path
        if let Some(path) = &result.path {
            if path.success {
                let pose = navigator.pose();
                let next = path.step_toward(pose.position(), step_m);
                let yaw = if next.distance(&pose.position()) > 1e-4 {
                    pose.position().angle_to(&next)
                } else {
                    pose.yaw
                };
                navigator.set_pose(RobotPose::new(next.x, next.y, yaw));
            }
        } else if result.mode == NavMode::Recovering {
            // Rotation actions turn in place
            let pose = navigator.pose();
            navigator.set_pose(RobotPose::new(
                pose.x,
                pose.y,
                normalize_angle(pose.yaw + std::f32::consts::FRAC_PI_2),
            ));
        }
    }

    let pose = navigator.pose();
    let png = navigator.renderer().render_png(
        navigator.bridge().world_model(),
        &pose,
        navigator.goal(),
        &[],
    )?;
    std::fs::write(&args.map_out, png)?;
    info!(path = %args.map_out.display(), "wrote final map");

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run() {
        error!(error = %e, "simulation failed");
        std::process::exit(1);
    }
}
