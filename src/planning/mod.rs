//! Path planning over the inflated occupancy grid.

mod astar;
mod inflation;

pub use astar::{LocalPlanner, PathResult};
pub use inflation::InflatedGrid;
