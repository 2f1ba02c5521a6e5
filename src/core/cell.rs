//! Cell types for the occupancy grid.
//!
//! Each cell carries an observed state and a clamped confidence. `Explored`
//! is a sensor-certified refinement of `Free`: once promoted, the cell can
//! no longer be rewritten by advisory (model-proposed) corrections.

use serde::{Deserialize, Serialize};

/// Observed state of a grid cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    /// Cell has never been observed
    #[default]
    Unknown,

    /// Observed traversable at least once
    Free,

    /// Sensor ray terminated here
    Obstacle,

    /// Free cell certified by repeated consistent observations; immutable
    /// by advisory corrections
    Explored,
}

impl CellState {
    /// Can the robot traverse this cell?
    #[inline]
    pub fn is_traversable(self) -> bool {
        matches!(self, CellState::Free | CellState::Explored)
    }

    /// Has this cell been observed?
    #[inline]
    pub fn is_known(self) -> bool {
        self != CellState::Unknown
    }

    /// Single character representation for debugging and RLE tokens
    pub fn as_char(self) -> char {
        match self {
            CellState::Unknown => 'U',
            CellState::Free => 'F',
            CellState::Obstacle => 'O',
            CellState::Explored => 'E',
        }
    }

    /// Inverse of [`as_char`](Self::as_char)
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'U' => Some(CellState::Unknown),
            'F' => Some(CellState::Free),
            'O' => Some(CellState::Obstacle),
            'E' => Some(CellState::Explored),
            _ => None,
        }
    }
}

/// A single cell in the grid with metadata
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Observed state
    pub state: CellState,

    /// Confidence in the observed state, always clamped to [0, 1]
    pub confidence: f32,

    /// Cycle stamp of the most recent observation
    pub last_updated: u64,

    /// Consecutive consistent observations (saturating)
    pub observations: u16,
}

/// Confidence gained per consistent observation
const OBSERVE_GAIN: f32 = 0.15;

/// Confidence assigned when an observation flips the cell state
const FLIP_CONFIDENCE: f32 = 0.5;

impl Cell {
    /// Update the cell with a sensor observation.
    /// Returns true if the state changed.
    pub fn observe(&mut self, observed: CellState, cycle: u64) -> bool {
        let changed = self.state != observed;

        if changed {
            self.state = observed;
            self.confidence = FLIP_CONFIDENCE;
            self.observations = 1;
        } else {
            self.confidence = (self.confidence + OBSERVE_GAIN).min(1.0);
            self.observations = self.observations.saturating_add(1);
        }
        self.last_updated = cycle;

        changed
    }

    /// Overwrite state and confidence directly, clamping confidence.
    /// Used by the advisory correction path after gating.
    pub fn overwrite(&mut self, state: CellState, confidence: f32, cycle: u64) {
        self.state = state;
        self.confidence = confidence.clamp(0.0, 1.0);
        self.observations = 0;
        self.last_updated = cycle;
    }

    /// Decay confidence of a stale cell by a fraction of its current value
    pub fn decay(&mut self, rate: f32) {
        self.confidence = (self.confidence * (1.0 - rate)).clamp(0.0, 1.0);
    }
}

/// Cell counts by state
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CellCounts {
    /// Never observed
    pub unknown: usize,
    /// Observed traversable
    pub free: usize,
    /// Observed blocked
    pub obstacle: usize,
    /// Sensor-certified free
    pub explored: usize,
}

impl CellCounts {
    /// Total observed cells
    pub fn known(&self) -> usize {
        self.free + self.obstacle + self.explored
    }

    /// Total cells
    pub fn total(&self) -> usize {
        self.unknown + self.known()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_traversable() {
        assert!(!CellState::Unknown.is_traversable());
        assert!(CellState::Free.is_traversable());
        assert!(!CellState::Obstacle.is_traversable());
        assert!(CellState::Explored.is_traversable());
    }

    #[test]
    fn test_char_round_trip() {
        for state in [
            CellState::Unknown,
            CellState::Free,
            CellState::Obstacle,
            CellState::Explored,
        ] {
            assert_eq!(CellState::from_char(state.as_char()), Some(state));
        }
        assert_eq!(CellState::from_char('x'), None);
    }

    #[test]
    fn test_observe_confidence() {
        let mut cell = Cell::default();
        assert!(cell.observe(CellState::Free, 1));
        assert!((cell.confidence - FLIP_CONFIDENCE).abs() < 1e-6);

        // Consistent observations grow confidence, clamped at 1.0
        for cycle in 2..20 {
            assert!(!cell.observe(CellState::Free, cycle));
        }
        assert!(cell.confidence <= 1.0);
        assert!(cell.confidence > 0.9);

        // A flip resets confidence
        assert!(cell.observe(CellState::Obstacle, 20));
        assert!((cell.confidence - FLIP_CONFIDENCE).abs() < 1e-6);
        assert_eq!(cell.observations, 1);
    }

    #[test]
    fn test_overwrite_clamps() {
        let mut cell = Cell::default();
        cell.overwrite(CellState::Obstacle, 2.0, 1);
        assert!((cell.confidence - 1.0).abs() < 1e-6);
        cell.overwrite(CellState::Free, -0.5, 2);
        assert!(cell.confidence.abs() < 1e-6);
    }

    #[test]
    fn test_decay_clamps() {
        let mut cell = Cell::default();
        cell.overwrite(CellState::Free, 0.8, 1);
        cell.decay(0.5);
        assert!((cell.confidence - 0.4).abs() < 1e-6);
    }
}
