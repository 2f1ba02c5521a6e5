//! Occupancy world model: grid storage, sensor fusion, and serialization.

mod grid;
mod model;
mod raycast;
mod serialize;

pub use grid::OccupancyGrid;
pub use model::{CorrectionOutcome, SensorReading, UpdateStats, WorldModel};
pub use raycast::{cells_along_ray, BresenhamLine};
pub use serialize::{decode_rle, encode_rle, GridSnapshot, SnapshotFormat, WorldSnapshot};
