//! Core types for ManasNav.
//!
//! Coordinate convention follows ROS REP-103:
//! - **X-axis**: Forward (positive ahead of robot)
//! - **Y-axis**: Left (positive to robot's left)
//! - **Yaw**: Counter-clockwise rotation from +X axis (radians)

mod cell;
mod point;
mod pose;

pub use cell::{Cell, CellCounts, CellState};
pub use point::{GridCoord, WorldPoint};
pub use pose::{normalize_angle, RobotPose};
