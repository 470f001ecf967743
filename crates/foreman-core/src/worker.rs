//! Worker identity and per-worker state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::action::Failure;
use crate::error::CoreError;
use crate::status::WorkerStatus;

/// Identifier of one of the fixed set of workers.
///
/// The set is closed: no worker is created or destroyed at runtime. The
/// snake_case wire form doubles as the launch key for worker processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerId {
    Bundler,
    DevServer,
    Linter,
    TestRunner,
    Transpiler,
    Watcher,
}

impl WorkerId {
    /// Number of workers.
    pub const COUNT: usize = 6;

    /// Every worker, in registry order.
    pub const ALL: [WorkerId; Self::COUNT] = [
        Self::Bundler,
        Self::DevServer,
        Self::Linter,
        Self::TestRunner,
        Self::Transpiler,
        Self::Watcher,
    ];

    /// Wire name, also used as the process launch key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundler => "bundler",
            Self::DevServer => "dev_server",
            Self::Linter => "linter",
            Self::TestRunner => "test_runner",
            Self::Transpiler => "transpiler",
            Self::Watcher => "watcher",
        }
    }

    /// Human readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bundler => "Bundler",
            Self::DevServer => "Dev Server",
            Self::Linter => "Linter",
            Self::TestRunner => "Test Runner",
            Self::Transpiler => "Transpiler",
            Self::Watcher => "Watcher",
        }
    }

    /// Returns true for workers that stay up after signaling readiness.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Self::Watcher | Self::DevServer)
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownWorker(s.to_string()))
    }
}

/// Current state of one worker as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    /// Which worker this is.
    pub id: WorkerId,

    /// Current lifecycle status.
    pub status: WorkerStatus,

    /// Last failure; present only while `status` is `Error`.
    pub error: Option<Failure>,
}

impl Worker {
    /// A worker in its initial `Offline` state.
    pub fn offline(id: WorkerId) -> Self {
        Self {
            id,
            status: WorkerStatus::Offline,
            error: None,
        }
    }

    /// Display name of the worker.
    pub fn name(&self) -> &'static str {
        self.id.display_name()
    }
}
