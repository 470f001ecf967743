//! Actions: the single vocabulary exchanged between components.
//!
//! Actions travel unchanged across the process boundary. On the wire each
//! one is a JSON object with a `type` tag and a `payload` object:
//!
//! ```text
//! {"type":"WORKER_READY","payload":{"worker":"watcher"}}
//! {"type":"SET_GOAL","payload":{"goal":"watch"}}
//! {"type":"LINT"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::goal::Goal;
use crate::status::WorkerStatus;
use crate::worker::WorkerId;

/// Category of a worker failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The worker process could not be started.
    LaunchFailure,
    /// The leaf program reported an error during its unit of work.
    WorkerFailure,
    /// A malformed or misaddressed message arrived from the process.
    ProtocolViolation,
    /// The worker did not become ready in time.
    Timeout,
    /// The process exited unsuccessfully.
    ProcessExited,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LaunchFailure => "launch failure",
            Self::WorkerFailure => "worker failure",
            Self::ProtocolViolation => "protocol violation",
            Self::Timeout => "timeout",
            Self::ProcessExited => "process exited",
        };
        f.write_str(s)
    }
}

/// Error payload carried by [`Action::WorkerError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::new(FailureKind::LaunchFailure, message)
    }

    pub fn worker(message: impl Into<String>) -> Self {
        Self::new(FailureKind::WorkerFailure, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ProtocolViolation, message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Declare a new goal, superseding the previous one.
    SetGoal { goal: Goal },

    WorkerBusy { worker: WorkerId },
    WorkerReady { worker: WorkerId },
    WorkerDone { worker: WorkerId },
    WorkerError { worker: WorkerId, error: Failure },
    WorkerOffline { worker: WorkerId },
    WorkerStop { worker: WorkerId },

    /// Transpile one file, or every matching source file when `path` is absent.
    Transpile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Lint,
    Test,
    Bundle,

    /// A watched source file changed.
    FileChanged { path: String },
    /// The transpiler finished writing these files.
    TranspileDone { files: Vec<String> },
    /// An external tool run by a one-shot worker finished successfully.
    ToolDone { worker: WorkerId },
}

impl Action {
    /// The `{worker, status, error?}` shape of a status-change action.
    pub fn status_change(&self) -> Option<(WorkerId, WorkerStatus, Option<&Failure>)> {
        match self {
            Self::WorkerBusy { worker } => Some((*worker, WorkerStatus::Busy, None)),
            Self::WorkerReady { worker } => Some((*worker, WorkerStatus::Ready, None)),
            Self::WorkerDone { worker } => Some((*worker, WorkerStatus::Done, None)),
            Self::WorkerError { worker, error } => Some((*worker, WorkerStatus::Error, Some(error))),
            Self::WorkerOffline { worker } => Some((*worker, WorkerStatus::Offline, None)),
            Self::WorkerStop { worker } => Some((*worker, WorkerStatus::Stop, None)),
            _ => None,
        }
    }

    /// The worker this action is addressed to, if any.
    pub fn worker(&self) -> Option<WorkerId> {
        match self {
            Self::ToolDone { worker } => Some(*worker),
            _ => self.status_change().map(|(worker, _, _)| worker),
        }
    }

    /// The goal carried by a `SetGoal` action.
    pub fn goal(&self) -> Option<Goal> {
        match self {
            Self::SetGoal { goal } => Some(*goal),
            _ => None,
        }
    }

    /// Returns true if this action ends a readiness wait for `worker`.
    pub fn settles(&self, worker: WorkerId) -> bool {
        matches!(
            self.status_change(),
            Some((w, status, _)) if w == worker && status.is_settled()
        )
    }

    /// Returns true if this action takes `worker` out of service, either
    /// because its process ended or because it was told to stop.
    pub fn exits(&self, worker: WorkerId) -> bool {
        matches!(
            self,
            Self::WorkerOffline { worker: w } | Self::WorkerStop { worker: w } if *w == worker
        )
    }

    /// Wire tag of the action, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SetGoal { .. } => "SET_GOAL",
            Self::WorkerBusy { .. } => "WORKER_BUSY",
            Self::WorkerReady { .. } => "WORKER_READY",
            Self::WorkerDone { .. } => "WORKER_DONE",
            Self::WorkerError { .. } => "WORKER_ERROR",
            Self::WorkerOffline { .. } => "WORKER_OFFLINE",
            Self::WorkerStop { .. } => "WORKER_STOP",
            Self::Transpile { .. } => "TRANSPILE",
            Self::Lint => "LINT",
            Self::Test => "TEST",
            Self::Bundle => "BUNDLE",
            Self::FileChanged { .. } => "FILE_CHANGED",
            Self::TranspileDone { .. } => "TRANSPILE_DONE",
            Self::ToolDone { .. } => "TOOL_DONE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let action = Action::WorkerReady {
            worker: WorkerId::Watcher,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({ "type": "WORKER_READY", "payload": { "worker": "watcher" } })
        );

        let value = serde_json::to_value(Action::SetGoal { goal: Goal::Watch }).unwrap();
        assert_eq!(value, json!({ "type": "SET_GOAL", "payload": { "goal": "watch" } }));
    }

    #[test]
    fn test_error_payload_on_wire() {
        let action = Action::WorkerError {
            worker: WorkerId::Linter,
            error: Failure::worker("eslint exited with 1"),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["payload"]["error"]["kind"], "worker_failure");
        assert_eq!(value["payload"]["error"]["message"], "eslint exited with 1");
    }

    #[test]
    fn test_unit_and_optional_payloads_parse() {
        let lint: Action = serde_json::from_str(r#"{"type":"LINT"}"#).unwrap();
        assert_eq!(lint, Action::Lint);

        let all: Action = serde_json::from_str(r#"{"type":"TRANSPILE","payload":{}}"#).unwrap();
        assert_eq!(all, Action::Transpile { path: None });

        let one: Action =
            serde_json::from_str(r#"{"type":"TRANSPILE","payload":{"path":"src/a.js"}}"#).unwrap();
        assert_eq!(
            one,
            Action::Transpile {
                path: Some("src/a.js".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<Action>(r#"{"type":"REBOOT","payload":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_status_change_shape() {
        let failure = Failure::launch("no such file");
        let action = Action::WorkerError {
            worker: WorkerId::Bundler,
            error: failure.clone(),
        };
        assert_eq!(
            action.status_change(),
            Some((WorkerId::Bundler, WorkerStatus::Error, Some(&failure)))
        );
        assert_eq!(Action::Lint.status_change(), None);
        assert_eq!(Action::SetGoal { goal: Goal::Lint }.worker(), None);
    }

    #[test]
    fn test_settles_only_for_addressed_worker() {
        let ready = Action::WorkerReady {
            worker: WorkerId::Linter,
        };
        assert!(ready.settles(WorkerId::Linter));
        assert!(!ready.settles(WorkerId::Watcher));
        assert!(!Action::WorkerBusy {
            worker: WorkerId::Linter
        }
        .settles(WorkerId::Linter));
    }

    #[test]
    fn test_offline_and_stop_are_exits_not_settles() {
        for action in [
            Action::WorkerOffline {
                worker: WorkerId::Watcher,
            },
            Action::WorkerStop {
                worker: WorkerId::Watcher,
            },
        ] {
            assert!(action.exits(WorkerId::Watcher));
            assert!(!action.exits(WorkerId::Linter));
            assert!(!action.settles(WorkerId::Watcher));
        }
        assert!(!Action::WorkerReady {
            worker: WorkerId::Watcher
        }
        .exits(WorkerId::Watcher));
    }
}
