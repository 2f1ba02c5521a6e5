//! Decision schema and defensive parsing.
//!
//! Every decision must name a fallback before it is accepted. Parsing is
//! deliberately forgiving about transport noise (code fences, prose around
//! the JSON object) and strict about the schema itself.

use serde::{Deserialize, Serialize};

use crate::core::CellState;
use crate::error::{NavError, Result};

/// The action a decision requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Move to a candidate by id, or to explicit coordinates
    #[serde(rename = "MOVE_TO")]
    MoveTo {
        #[serde(default)]
        target_id: Option<String>,
        #[serde(default)]
        target_m: Option<[f32; 2]>,
    },

    /// Head for a frontier candidate to expand the map
    #[serde(rename = "EXPLORE")]
    Explore {
        #[serde(default)]
        target_id: Option<String>,
    },

    /// Rotate in place, optionally to an absolute heading in degrees
    #[serde(rename = "ROTATE_TO")]
    RotateTo {
        #[serde(default)]
        yaw_deg: Option<f32>,
    },

    /// Track the nearest wall on the current side
    #[serde(rename = "FOLLOW_WALL")]
    FollowWall,

    /// Halt in place
    #[serde(rename = "STOP")]
    Stop,
}

/// Actions permitted as a fallback. Deliberately simpler than [`Action`]:
/// a fallback must always be executable without further planning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackAction {
    #[serde(rename = "EXPLORE")]
    Explore,
    #[serde(rename = "ROTATE_TO")]
    RotateTo,
    #[serde(rename = "STOP")]
    Stop,
}

/// Mandatory contingency attached to every decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub if_failed: FallbackAction,
    #[serde(default)]
    pub target_id: Option<String>,
}

/// An advisory world-model correction proposed by a decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    /// World position of the cell to correct, in meters
    pub pos_m: [f32; 2],
    pub observed_state: CellState,
    /// Proposed confidence in [0, 1]
    pub confidence: f32,
}

/// Optional world-model update block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldModelUpdate {
    #[serde(default)]
    pub corrections: Vec<Correction>,
}

/// A parsed, schema-valid navigation decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavDecision {
    pub action: Action,
    pub fallback: Fallback,
    #[serde(default)]
    pub world_model_update: Option<WorldModelUpdate>,
    #[serde(default)]
    pub explanation: String,
}

impl NavDecision {
    /// Deterministic decision used when inference fails outright
    pub fn fallback_explore() -> Self {
        Self {
            action: Action::Explore { target_id: None },
            fallback: Fallback {
                if_failed: FallbackAction::Stop,
                target_id: None,
            },
            world_model_update: None,
            explanation: "inference unavailable, exploring".to_string(),
        }
    }

    /// Promote a decision's fallback into an executable decision. The new
    /// decision falls back to STOP, which cannot fail.
    pub fn from_fallback(fallback: &Fallback) -> Self {
        let action = match fallback.if_failed {
            FallbackAction::Explore => Action::Explore {
                target_id: fallback.target_id.clone(),
            },
            FallbackAction::RotateTo => Action::RotateTo { yaw_deg: None },
            FallbackAction::Stop => Action::Stop,
        };
        Self {
            action,
            fallback: Fallback {
                if_failed: FallbackAction::Stop,
                target_id: None,
            },
            world_model_update: None,
            explanation: "primary action failed, executing fallback".to_string(),
        }
    }
}

/// Parse a raw inference response into a decision.
///
/// Tolerates markdown code fences and prose before or after the JSON object
/// by extracting the outermost brace span. Schema violations, including a
/// missing fallback, are parse errors.
pub fn parse_decision(raw: &str) -> Result<NavDecision> {
    let body = extract_json(raw)
        .ok_or_else(|| NavError::DecisionParse("no JSON object in response".to_string()))?;
    serde_json::from_str(body).map_err(|e| NavError::DecisionParse(e.to_string()))
}

/// The outermost `{ ... }` span of a response, if any
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        Some(&raw[start..=end])
    } else {
        None
    }
}
