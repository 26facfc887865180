/// Task status definitions and the lifecycle state machine
///
/// ```text
/// Pending -> Running -> {Completed, Failed, Partial, Cancelled}
/// Pending -> Cancelled
/// ```
///
/// Terminal states have no outgoing transitions.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents the current state of an orchestrated task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    // ===== Active States =====
    /// Submitted, waiting for a global task slot
    Pending,

    /// Execution routine holds a slot and is working through its phases
    Running,

    // ===== Terminal States =====
    /// Every item succeeded within the deadline
    Completed,

    /// Nothing usable was produced, or discovery failed
    Failed,

    /// Some results exist, but items failed or the deadline was reached
    Partial,

    /// Stopped on request; never counted as a failure
    Cancelled,
}

impl TaskStatus {
    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if the task has not reached a final state yet
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if the task produced usable results
    pub fn has_results(&self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }

    /// Checks whether the lifecycle allows moving from `self` to `next`
    ///
    /// Governs sealed verdicts only. While a task runs, the status derived
    /// from its progress counters is provisional and may be replaced by a
    /// different terminal status when the record is sealed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    /// Wire representation used in status views and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Partial => "partial",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns all possible task states
    pub fn all_states() -> [Self; 6] {
        [
            Self::Pending,
            Self::Running,
            Self::Completed,
            Self::Failed,
            Self::Partial,
            Self::Cancelled,
        ]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all_states()
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown task status '{}'", s))
    }
}
