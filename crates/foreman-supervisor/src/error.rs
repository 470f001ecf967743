//! Supervisor errors.

use foreman_core::{Failure, Goal, WorkerId};
use thiserror::Error;

/// Errors surfaced by the supervisor to its caller.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Supervisor already started")]
    AlreadyStarted,

    #[error("No worker serves goal '{0}'")]
    NoWorkersForGoal(Goal),

    #[error("Goal '{goal}' failed: {}", summarize(.failures))]
    GoalFailed {
        goal: Goal,
        failures: Vec<(WorkerId, Failure)>,
    },

    #[error("Action stream closed")]
    StreamClosed,
}

fn summarize(failures: &[(WorkerId, Failure)]) -> String {
    failures
        .iter()
        .map(|(worker, failure)| format!("{worker} ({failure})"))
        .collect::<Vec<_>>()
        .join(", ")
}
