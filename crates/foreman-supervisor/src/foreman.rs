//! The foreman: publishes goals and routes worker notifications.

use std::sync::Arc;

use foreman_core::{Action, Goal, WorkerId, WorkerStatus};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::{Origin, Published, Store};

/// Front door of the supervisor for callers.
#[derive(Clone)]
pub struct Foreman {
    store: Arc<Store>,
}

impl Foreman {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Declare a new goal; it supersedes the previous one.
    pub fn set_goal(&self, goal: Goal) {
        info!(goal = %goal, "Setting goal");
        self.store.publish(Action::SetGoal { goal });
    }

    pub fn current_goal(&self) -> Option<Goal> {
        self.store.goal()
    }

    /// Ask a worker to halt. The request reaches the process through its
    /// bridge.
    pub fn stop(&self, worker: WorkerId) {
        info!(worker = %worker, "Stopping worker");
        self.store.publish(Action::WorkerStop { worker });
    }

    /// Relaunch a failed or stopped worker under the current goal.
    ///
    /// Returns false (and does nothing) unless the worker is in `Error` or
    /// `Stop`.
    pub fn retry(&self, worker: WorkerId) -> bool {
        let status = self.store.status(worker);
        if !matches!(status, WorkerStatus::Error | WorkerStatus::Stop) {
            debug!(worker = %worker, status = %status, "Nothing to retry");
            return false;
        }

        info!(worker = %worker, previous = %status, "Retrying worker");
        self.store.publish(Action::WorkerOffline { worker });
        match self.store.goal() {
            Some(goal) => self.store.publish(Action::SetGoal { goal }),
            None => warn!(worker = %worker, "No goal set, worker stays offline"),
        }
        true
    }

    /// Spawn the router that turns worker notifications into commands.
    pub fn spawn_router(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let mut actions = store.subscribe();
        tokio::spawn(async move {
            loop {
                let published = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = actions.recv() => match next {
                        Some(published) => published,
                        None => break,
                    },
                };
                if let Some(command) = route(&published) {
                    debug!(action = command.kind(), "Routing worker notification");
                    store.publish(command);
                }
            }
            debug!("Router stopped");
        })
    }
}

/// The foreman command a published action calls for, if any.
pub fn route(published: &Published) -> Option<Action> {
    match (&published.origin, &published.action) {
        (Origin::Worker(_), Action::FileChanged { path }) => Some(Action::Transpile {
            path: Some(path.clone()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::Failure;
    use std::time::Duration;

    #[test]
    fn test_set_goal_updates_current_goal() {
        let foreman = Foreman::new(Store::new(16));
        assert_eq!(foreman.current_goal(), None);
        foreman.set_goal(Goal::Build);
        foreman.set_goal(Goal::Serve);
        assert_eq!(foreman.current_goal(), Some(Goal::Serve));
    }

    #[test]
    fn test_stop_publishes_stop() {
        let store = Store::new(16);
        let foreman = Foreman::new(store.clone());
        foreman.stop(WorkerId::DevServer);
        assert_eq!(store.status(WorkerId::DevServer), WorkerStatus::Stop);
    }

    #[test]
    fn test_route_file_changed_from_worker() {
        let published = Published {
            origin: Origin::Worker(WorkerId::Watcher),
            action: Action::FileChanged {
                path: "src/app.jsx".to_string(),
            },
        };
        assert_eq!(
            route(&published),
            Some(Action::Transpile {
                path: Some("src/app.jsx".to_string())
            })
        );
    }

    #[test]
    fn test_route_ignores_foreman_actions() {
        let published = Published {
            origin: Origin::Foreman,
            action: Action::FileChanged {
                path: "src/app.jsx".to_string(),
            },
        };
        assert_eq!(route(&published), None);

        let published = Published {
            origin: Origin::Worker(WorkerId::Linter),
            action: Action::ToolDone {
                worker: WorkerId::Linter,
            },
        };
        assert_eq!(route(&published), None);
    }

    #[tokio::test]
    async fn test_retry_resets_errored_worker_and_reasserts_goal() {
        let store = Store::new(16);
        let foreman = Foreman::new(store.clone());
        foreman.set_goal(Goal::Lint);
        store.publish(Action::WorkerError {
            worker: WorkerId::Linter,
            error: Failure::worker("lint failed"),
        });
        let mut sub = store.subscribe();

        assert!(foreman.retry(WorkerId::Linter));
        assert_eq!(
            sub.recv().await.map(|p| p.action),
            Some(Action::WorkerOffline {
                worker: WorkerId::Linter
            })
        );
        assert_eq!(
            sub.recv().await.map(|p| p.action),
            Some(Action::SetGoal { goal: Goal::Lint })
        );
        assert_eq!(store.status(WorkerId::Linter), WorkerStatus::Offline);
    }

    #[test]
    fn test_retry_ignores_healthy_worker() {
        let store = Store::new(16);
        let foreman = Foreman::new(store.clone());
        store.publish(Action::WorkerReady {
            worker: WorkerId::Watcher,
        });
        assert!(!foreman.retry(WorkerId::Watcher));
        assert!(!foreman.retry(WorkerId::Linter));
        assert_eq!(store.status(WorkerId::Watcher), WorkerStatus::Ready);
    }

    #[tokio::test]
    async fn test_router_republishes_transpile() {
        let store = Store::new(16);
        let foreman = Foreman::new(store.clone());
        let shutdown = CancellationToken::new();
        let router = foreman.spawn_router(shutdown.clone());
        let mut sub = store.subscribe();

        store.dispatch(
            Origin::Worker(WorkerId::Watcher),
            Action::FileChanged {
                path: "src/a.js".to_string(),
            },
        );

        let routed = tokio::time::timeout(
            Duration::from_secs(1),
            sub.take(|p| p.origin == Origin::Foreman),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            routed.action,
            Action::Transpile {
                path: Some("src/a.js".to_string())
            }
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), router)
            .await
            .unwrap()
            .unwrap();
    }
}
