//! Compact world-model serialization for prompt context.
//!
//! The grid travels to the inference provider as run-length encoded JSON.
//! Full snapshots carry run tokens like `"U:1200"`; patch snapshots carry
//! per-cell deltas like `"137:O"` against the last full snapshot.

use crate::core::{CellState, GridCoord, RobotPose, WorldPoint};
use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};

use super::grid::OccupancyGrid;

/// Which encoding to produce for a snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Full RLE of every cell
    Full,
    /// Only cells changed since the last snapshot
    Patch,
}

/// JSON envelope carrying the encoded grid
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridSnapshot {
    /// `"rle_full"` or `"rle_patch"`
    pub format: String,
    pub width: usize,
    pub height: usize,
    pub resolution_m: f32,
    /// Run tokens (`"U:1200"`) or patch tokens (`"137:O"`)
    pub tokens: Vec<String>,
}

/// The three textual views of the world handed to the decision frame
#[derive(Clone, Debug)]
pub struct WorldSnapshot {
    /// RLE grid as a JSON string
    pub grid_json: String,
    /// Human-readable character grid with robot and goal markers
    pub ascii: String,
    /// JSON summary of counts, pose, and goal geometry
    pub symbolic: String,
}

/// Run-length encode a row-major state sequence
pub fn encode_rle(states: impl Iterator<Item = CellState>) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut run: Option<(CellState, usize)> = None;

    for state in states {
        match run {
            Some((s, n)) if s == state => run = Some((s, n + 1)),
            Some((s, n)) => {
                tokens.push(format!("{}:{}", s.as_char(), n));
                run = Some((state, 1));
            }
            None => run = Some((state, 1)),
        }
    }
    if let Some((s, n)) = run {
        tokens.push(format!("{}:{}", s.as_char(), n));
    }

    tokens
}

/// Decode run tokens back to a state sequence
pub fn decode_rle(tokens: &[String]) -> Result<Vec<CellState>> {
    let mut states = Vec::new();
    for token in tokens {
        let (state_str, count_str) = token
            .split_once(':')
            .ok_or_else(|| NavError::Serialization(format!("malformed RLE token: {token}")))?;
        let state = state_str
            .chars()
            .next()
            .and_then(CellState::from_char)
            .filter(|_| state_str.len() == 1)
            .ok_or_else(|| NavError::Serialization(format!("unknown RLE state: {token}")))?;
        let count: usize = count_str
            .parse()
            .map_err(|_| NavError::Serialization(format!("bad RLE count: {token}")))?;
        states.extend(std::iter::repeat(state).take(count));
    }
    Ok(states)
}

/// Encode changed cells as `"index:STATE"` patch tokens
pub fn encode_patch(grid: &OccupancyGrid, changed: impl Iterator<Item = usize>) -> Vec<String> {
    let mut indices: Vec<usize> = changed.collect();
    indices.sort_unstable();
    indices
        .into_iter()
        .map(|idx| format!("{}:{}", idx, grid.cells()[idx].state.as_char()))
        .collect()
}

/// Build the JSON grid envelope for a full or patch snapshot
pub fn grid_snapshot(
    grid: &OccupancyGrid,
    format: SnapshotFormat,
    changed: &[usize],
) -> GridSnapshot {
    let (format_name, tokens) = match format {
        SnapshotFormat::Full => (
            "rle_full",
            encode_rle(grid.cells().iter().map(|c| c.state)),
        ),
        SnapshotFormat::Patch => ("rle_patch", encode_patch(grid, changed.iter().copied())),
    };
    GridSnapshot {
        format: format_name.to_string(),
        width: grid.width(),
        height: grid.height(),
        resolution_m: grid.resolution(),
        tokens,
    }
}

/// Render the grid as character rows, top row first (highest y).
/// The robot cell is drawn `R` and the goal cell `G`.
pub fn ascii_grid(grid: &OccupancyGrid, pose: &RobotPose, goal: Option<WorldPoint>) -> String {
    let robot = grid.world_to_grid(pose.position());
    let goal_coord = goal.and_then(|g| grid.world_to_grid(g));

    let mut out = String::with_capacity((grid.width() + 1) * grid.height());
    for y in (0..grid.height() as i32).rev() {
        for x in 0..grid.width() as i32 {
            let coord = GridCoord::new(x, y);
            let ch = if robot == Some(coord) {
                'R'
            } else if goal_coord == Some(coord) {
                'G'
            } else {
                grid.state(coord).as_char()
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cell;

    #[test]
    fn test_rle_round_trip() {
        let states = vec![
            CellState::Unknown,
            CellState::Unknown,
            CellState::Free,
            CellState::Free,
            CellState::Free,
            CellState::Obstacle,
            CellState::Explored,
            CellState::Explored,
        ];
        let tokens = encode_rle(states.iter().copied());
        assert_eq!(tokens, vec!["U:2", "F:3", "O:1", "E:2"]);
        assert_eq!(decode_rle(&tokens).unwrap(), states);
    }

    #[test]
    fn test_rle_empty() {
        let tokens = encode_rle(std::iter::empty());
        assert!(tokens.is_empty());
        assert!(decode_rle(&tokens).unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_rle(&["U1200".to_string()]).is_err());
        assert!(decode_rle(&["X:5".to_string()]).is_err());
        assert!(decode_rle(&["F:lots".to_string()]).is_err());
    }

    #[test]
    fn test_full_snapshot_covers_grid() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::ZERO);
        grid.cells_mut()[5] = Cell {
            state: CellState::Obstacle,
            confidence: 0.8,
            last_updated: 1,
            observations: 1,
        };
        let snap = grid_snapshot(&grid, SnapshotFormat::Full, &[]);
        assert_eq!(snap.format, "rle_full");
        let decoded = decode_rle(&snap.tokens).unwrap();
        assert_eq!(decoded.len(), 100);
        assert_eq!(decoded[5], CellState::Obstacle);
    }

    #[test]
    fn test_patch_tokens_sorted() {
        let mut grid = OccupancyGrid::new(10, 10, 0.1, WorldPoint::ZERO);
        grid.cells_mut()[7].state = CellState::Free;
        grid.cells_mut()[3].state = CellState::Obstacle;
        let tokens = encode_patch(&grid, [7usize, 3].into_iter());
        assert_eq!(tokens, vec!["3:O", "7:F"]);
    }

    #[test]
    fn test_ascii_markers() {
        let grid = OccupancyGrid::new(5, 5, 0.1, WorldPoint::ZERO);
        let pose = RobotPose::new(0.05, 0.05, 0.0);
        let goal = Some(WorldPoint::new(0.45, 0.45));
        let ascii = ascii_grid(&grid, &pose, goal);
        let rows: Vec<&str> = ascii.lines().collect();
        assert_eq!(rows.len(), 5);
        // Robot at (0,0) renders in the bottom-left, goal (4,4) top-right
        assert_eq!(rows[4].chars().next(), Some('R'));
        assert_eq!(rows[0].chars().last(), Some('G'));
    }
}
