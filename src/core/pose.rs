//! Robot pose in world coordinates.

use super::point::WorldPoint;
use serde::{Deserialize, Serialize};

/// Robot pose: position in world meters, yaw in radians (CCW from +X)
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotPose {
    /// X position in meters
    pub x: f32,
    /// Y position in meters
    pub y: f32,
    /// Heading in radians
    pub yaw: f32,
}

impl RobotPose {
    /// Create a new pose
    #[inline]
    pub fn new(x: f32, y: f32, yaw: f32) -> Self {
        Self { x, y, yaw }
    }

    /// Position component as a world point
    #[inline]
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// Euclidean distance from this pose to a world point
    #[inline]
    pub fn distance_to(&self, point: &WorldPoint) -> f32 {
        self.position().distance(point)
    }
}

/// Normalize an angle to (-pi, pi]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    } else if a <= -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    }
    a
}
