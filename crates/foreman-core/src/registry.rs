//! Worker registry: a pure reducer over status-change actions.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::status::WorkerStatus;
use crate::worker::{Worker, WorkerId};

/// Current status and last error of every worker.
///
/// Backed by a fixed array indexed by [`WorkerId`], so the registry can
/// never hold an unknown worker and every worker always has one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    workers: [Worker; WorkerId::COUNT],
}

impl Registry {
    /// All workers `Offline`, no errors.
    pub fn new() -> Self {
        Self {
            workers: WorkerId::ALL.map(Worker::offline),
        }
    }

    /// Fold one action into a new registry.
    ///
    /// Only the worker addressed by a status-change action is touched; its
    /// error is replaced by the action's failure or cleared. Any other
    /// action yields an identical registry.
    pub fn apply(&self, action: &Action) -> Self {
        let mut next = self.clone();
        if let Some((id, status, error)) = action.status_change() {
            let worker = &mut next.workers[id.index()];
            worker.status = status;
            worker.error = error.cloned();
        }
        next
    }

    /// Get one worker.
    pub fn get(&self, id: WorkerId) -> &Worker {
        &self.workers[id.index()]
    }

    /// Current status of one worker.
    pub fn status(&self, id: WorkerId) -> WorkerStatus {
        self.get(id).status
    }

    /// Iterate over all workers in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Failure;
    use crate::goal::Goal;

    #[test]
    fn test_initial_state_all_offline() {
        let registry = Registry::new();
        assert_eq!(registry.iter().count(), WorkerId::COUNT);
        for worker in registry.iter() {
            assert_eq!(worker.status, WorkerStatus::Offline);
            assert!(worker.error.is_none());
        }
    }

    #[test]
    fn test_apply_touches_only_addressed_worker() {
        let before = Registry::new().apply(&Action::WorkerReady {
            worker: WorkerId::DevServer,
        });

        for target in WorkerId::ALL {
            let after = before.apply(&Action::WorkerBusy { worker: target });
            assert_eq!(after.status(target), WorkerStatus::Busy);
            for other in WorkerId::ALL.into_iter().filter(|w| *w != target) {
                assert_eq!(after.get(other), before.get(other));
            }
        }
    }

    #[test]
    fn test_error_is_recorded_then_cleared() {
        let failure = Failure::worker("babel failed");
        let errored = Registry::new().apply(&Action::WorkerError {
            worker: WorkerId::Transpiler,
            error: failure.clone(),
        });
        assert_eq!(errored.status(WorkerId::Transpiler), WorkerStatus::Error);
        assert_eq!(errored.get(WorkerId::Transpiler).error, Some(failure));

        let recovered = errored.apply(&Action::WorkerOffline {
            worker: WorkerId::Transpiler,
        });
        assert_eq!(recovered.status(WorkerId::Transpiler), WorkerStatus::Offline);
        assert!(recovered.get(WorkerId::Transpiler).error.is_none());
    }

    #[test]
    fn test_non_status_actions_are_ignored() {
        let registry = Registry::new().apply(&Action::WorkerDone {
            worker: WorkerId::Linter,
        });
        for action in [
            Action::SetGoal { goal: Goal::Build },
            Action::Transpile { path: None },
            Action::FileChanged {
                path: "src/a.js".to_string(),
            },
            Action::ToolDone {
                worker: WorkerId::Linter,
            },
        ] {
            assert_eq!(registry.apply(&action), registry);
        }
    }

    #[test]
    fn test_apply_does_not_mutate_input() {
        let registry = Registry::new();
        let _ = registry.apply(&Action::WorkerStop {
            worker: WorkerId::Watcher,
        });
        assert_eq!(registry.status(WorkerId::Watcher), WorkerStatus::Offline);
    }

    #[test]
    fn test_every_status_is_reachable() {
        let mut registry = Registry::new();
        let worker = WorkerId::Bundler;
        for (action, status) in [
            (Action::WorkerBusy { worker }, WorkerStatus::Busy),
            (Action::WorkerReady { worker }, WorkerStatus::Ready),
            (Action::WorkerDone { worker }, WorkerStatus::Done),
            (Action::WorkerStop { worker }, WorkerStatus::Stop),
            (Action::WorkerOffline { worker }, WorkerStatus::Offline),
        ] {
            registry = registry.apply(&action);
            assert_eq!(registry.status(worker), status);
        }
    }
}
