//! Navigation state: mode, stuck tracking, decision history.

use std::collections::VecDeque;

use serde::Serialize;

use crate::core::WorldPoint;
use crate::decision::Action;

/// Movement below this distance between cycles counts as no progress
pub const STUCK_EPSILON_M: f32 = 0.05;

/// Operating mode of the navigation loop
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMode {
    #[default]
    Idle,
    Navigating,
    Exploring,
    Recovering,
    GoalReached,
    AvoidingObstacle,
}

/// One completed cycle, kept in the bounded history ring
#[derive(Clone, Debug, Serialize)]
pub struct HistoryEntry {
    pub cycle: u64,
    pub action: Action,
    pub mode: NavMode,
    pub position: [f32; 2],
    /// Whether the executed action resolved and planned successfully
    pub success: bool,
}

/// Mutable navigation state carried across cycles
#[derive(Clone, Debug)]
pub struct NavigationState {
    pub cycle: u64,
    pub mode: NavMode,
    /// Commanded speed telemetry, echoed into decision frames
    pub speed: f32,
    /// Battery fraction telemetry, echoed into decision frames
    pub battery: f32,
    /// Running trust in the decision maker, adjusted each cycle and
    /// clamped to [0, 1]
    pub confidence: f32,
    pub stuck_counter: u32,
    pub is_stuck: bool,
    last_position: Option<WorldPoint>,
    history: VecDeque<HistoryEntry>,
    max_history: usize,
}

impl NavigationState {
    pub fn new(max_history: usize) -> Self {
        Self {
            cycle: 0,
            mode: NavMode::Idle,
            speed: 0.0,
            battery: 1.0,
            confidence: 0.5,
            stuck_counter: 0,
            is_stuck: false,
            last_position: None,
            history: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Update stuck tracking from the position at the start of a cycle.
    ///
    /// The first observed position seeds the tracker without counting as a
    /// stall. `is_stuck` latches once `stuck_counter` reaches the threshold
    /// and releases on the next real movement.
    pub fn record_movement(&mut self, position: WorldPoint, stuck_threshold: u32) {
        if let Some(last) = self.last_position {
            if position.distance(&last) < STUCK_EPSILON_M {
                self.stuck_counter += 1;
            } else {
                self.stuck_counter = 0;
            }
        }
        self.is_stuck = self.stuck_counter >= stuck_threshold;
        self.last_position = Some(position);
    }

    /// Shift decision-maker confidence, clamped to [0, 1]
    pub fn adjust_confidence(&mut self, delta: f32) {
        self.confidence = (self.confidence + delta).clamp(0.0, 1.0);
    }

    /// Append to the bounded history ring, evicting the oldest entry
    pub fn push_history(&mut self, entry: HistoryEntry) {
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        let max_history = self.max_history;
        *self = Self::new(max_history);
    }
}
