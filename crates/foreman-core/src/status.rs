//! Worker lifecycle status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// No process running.
    #[default]
    Offline,
    /// Launch initiated or work in progress.
    Busy,
    /// Long-running worker is up and has signaled readiness.
    Ready,
    /// One-shot worker finished its unit of work.
    Done,
    /// Last operation failed.
    Error,
    /// Explicitly halted.
    Stop,
}

impl WorkerStatus {
    /// Returns true if a controller may launch the worker.
    pub fn is_launchable(&self) -> bool {
        matches!(self, Self::Offline)
    }

    /// Returns true if the worker has settled after a launch or unit of work.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Done | Self::Error)
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Offline => "offline",
            Self::Busy => "busy",
            Self::Ready => "ready",
            Self::Done => "done",
            Self::Error => "error",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}
