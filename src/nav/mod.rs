//! Navigation cycle: stuck detection, decision execution, mode tracking.

mod navigator;
mod state;

pub use navigator::{CycleResult, Navigator, SYSTEM_PROMPT};
pub use state::{HistoryEntry, NavMode, NavigationState};
