//! The global intent driving which workers run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A goal declared to the foreman. Exactly one goal is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Rebuild on every source change.
    Watch,
    /// Lint the sources once.
    Lint,
    /// Run the test suite once.
    Test,
    /// Produce a production build.
    Build,
    /// Run the dev server with rebuild on change.
    Serve,
}

impl Goal {
    /// Every goal.
    pub const ALL: [Goal; 5] = [
        Self::Watch,
        Self::Lint,
        Self::Test,
        Self::Build,
        Self::Serve,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watch => "watch",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::Build => "build",
            Self::Serve => "serve",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|goal| goal.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownGoal(s.to_string()))
    }
}
