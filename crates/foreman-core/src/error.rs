//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Foreman.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Name does not match any known worker.
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    /// Name does not match any known goal.
    #[error("Unknown goal: {0}")]
    UnknownGoal(String),
}
