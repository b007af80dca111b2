//! Runtime state to [`SimulationStatus`].
//!
//! Two independent mappings exist. Inspect sees the full state block and tells
//! Completed from Failed by exit code. List only sees the bare status word and
//! reports every `exited` container as Completed. The list view is knowingly
//! coarser; callers needing the exit outcome must inspect.

use autobox_common::SimulationStatus;

use crate::gateway::RawState;

/// Full state block, first match wins.
pub fn from_state(state: &RawState) -> SimulationStatus {
    if state.running {
        return SimulationStatus::Running;
    }
    if state.dead {
        return SimulationStatus::Failed;
    }
    if state.paused {
        return SimulationStatus::Stopped;
    }
    if state.restarting {
        return SimulationStatus::Running;
    }
    if state.status == "exited" {
        return if state.exit_code == 0 {
            SimulationStatus::Completed
        } else {
            SimulationStatus::Failed
        };
    }
    SimulationStatus::Pending
}

/// Bare status word from a listing, case-insensitive.
pub fn from_status_word(word: &str) -> SimulationStatus {
    match word.trim().to_ascii_lowercase().as_str() {
        "running" => SimulationStatus::Running,
        "exited" => SimulationStatus::Completed,
        "dead" => SimulationStatus::Failed,
        "paused" => SimulationStatus::Stopped,
        _ => SimulationStatus::Pending,
    }
}
