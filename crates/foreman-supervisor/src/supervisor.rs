//! Supervisor assembly: one store, one controller per worker, the router and
//! a transition logger, all sharing one shutdown token.

use std::sync::Arc;

use foreman_core::{Action, Goal, WorkerId, WorkerStatus};
use foreman_process::Launch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SupervisorConfig;
use crate::controller::{ControllerHandle, ControllerState, WorkerController};
use crate::error::SupervisorError;
use crate::foreman::Foreman;
use crate::store::{Origin, Store, Subscription};

pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<Store>,
    launcher: Arc<dyn Launch>,
    foreman: Foreman,
    shutdown: CancellationToken,
    controllers: Vec<ControllerHandle>,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, launcher: Arc<dyn Launch>) -> Self {
        let store = Store::new(config.bus_capacity);
        let foreman = Foreman::new(store.clone());
        Self {
            config,
            store,
            launcher,
            foreman,
            shutdown: CancellationToken::new(),
            controllers: Vec::new(),
            tasks: Vec::new(),
            started: false,
        }
    }

    /// Spawn the controllers, the router and the transition logger.
    ///
    /// Controllers subscribe before this returns, so a goal set right after
    /// `start` is never missed.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        if self.started {
            return Err(SupervisorError::AlreadyStarted);
        }
        self.started = true;

        self.tasks
            .push(spawn_transition_logger(self.store.subscribe(), self.shutdown.clone()));

        for spec in &self.config.workers {
            let controller = WorkerController::new(
                spec.clone(),
                self.store.clone(),
                self.launcher.clone(),
                self.config.readiness_timeout,
            );
            self.controllers
                .push(controller.spawn(self.shutdown.child_token()));
        }

        self.tasks
            .push(self.foreman.spawn_router(self.shutdown.clone()));

        info!(
            workers = self.controllers.len(),
            readiness_timeout = ?self.config.readiness_timeout,
            "Supervisor started"
        );
        Ok(())
    }

    pub fn foreman(&self) -> &Foreman {
        &self.foreman
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Current state of every controller.
    pub fn controller_states(&self) -> Vec<(WorkerId, ControllerState)> {
        self.controllers
            .iter()
            .map(|handle| (handle.worker(), handle.state()))
            .collect()
    }

    /// Wait until every worker serving `goal` is ready, done or errored.
    ///
    /// Fails with [`SupervisorError::GoalFailed`] listing the errored
    /// workers.
    pub async fn wait_for_goal(&self, goal: Goal) -> Result<(), SupervisorError> {
        let workers = self.config.workers_for(goal);
        if workers.is_empty() {
            return Err(SupervisorError::NoWorkersForGoal(goal));
        }

        let mut actions = self.store.subscribe();
        loop {
            let registry = self.store.registry();
            if workers.iter().all(|w| registry.status(*w).is_settled()) {
                let failures: Vec<_> = workers
                    .iter()
                    .filter_map(|w| {
                        let worker = registry.get(*w);
                        worker.error.clone().map(|failure| (*w, failure))
                    })
                    .collect();
                if failures.is_empty() {
                    info!(goal = %goal, "Goal reached");
                    return Ok(());
                }
                return Err(SupervisorError::GoalFailed { goal, failures });
            }

            actions
                .take(|published| published.action.status_change().is_some())
                .await
                .ok_or(SupervisorError::StreamClosed)?;
        }
    }

    /// Stop every running worker, wait for them within the shutdown grace,
    /// then stop all tasks. Processes still alive afterwards are killed.
    pub async fn shutdown(self) {
        let running: Vec<WorkerId> = WorkerId::ALL
            .into_iter()
            .filter(|w| is_running(self.store.status(*w)))
            .collect();

        if !running.is_empty() {
            let mut actions = self.store.subscribe();
            for worker in &running {
                self.foreman.stop(*worker);
            }

            let store = self.store.clone();
            let all_stopped = async {
                while running.iter().any(|w| is_running(store.status(*w))) {
                    if actions.recv().await.is_none() {
                        break;
                    }
                }
            };
            if tokio::time::timeout(self.config.shutdown_grace, all_stopped)
                .await
                .is_err()
            {
                warn!(
                    grace = ?self.config.shutdown_grace,
                    "Workers did not stop in time, killing them"
                );
            }
        }

        self.shutdown.cancel();
        for controller in self.controllers {
            controller.join().await;
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Supervisor task failed");
            }
        }
        info!("Supervisor stopped");
    }
}

/// Statuses that mean a process may still be alive.
fn is_running(status: WorkerStatus) -> bool {
    !matches!(status, WorkerStatus::Offline | WorkerStatus::Error)
}

/// Log every worker status transition.
fn spawn_transition_logger(
    mut actions: Subscription,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let published = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = actions.recv() => match next {
                    Some(published) => published,
                    None => break,
                },
            };
            let source = match published.origin {
                Origin::Foreman => "foreman",
                Origin::Worker(_) => "worker",
            };
            match &published.action {
                Action::WorkerError { worker, error } => {
                    warn!(worker = %worker, source, error = %error, "Worker failed");
                }
                action => match action.status_change() {
                    Some((worker, status, _)) => {
                        info!(worker = %worker, source, status = %status, "Worker status changed");
                    }
                    None => debug!(source, action = action.kind(), "Action"),
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{Failure, FailureKind};
    use foreman_process::MemoryLauncher;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    fn supervisor(only: &[WorkerId]) -> (Supervisor, Arc<MemoryLauncher>) {
        let launcher = Arc::new(MemoryLauncher::new());
        let mut config = SupervisorConfig::default().only(only);
        config.shutdown_grace = Duration::from_millis(200);
        (Supervisor::new(config, launcher.clone()), launcher)
    }

    /// Receive until an action matching `predicate` reaches the child.
    async fn recv_matching(
        child: &mut foreman_process::ChildEnd,
        predicate: impl Fn(&Action) -> bool,
    ) -> Action {
        tokio::time::timeout(WAIT, async {
            loop {
                match child.recv().await {
                    Some(action) if predicate(&action) => return action,
                    Some(_) => {}
                    None => panic!("child channel closed"),
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut sup, _) = supervisor(&[]);
        sup.start().unwrap();
        assert!(matches!(sup.start(), Err(SupervisorError::AlreadyStarted)));
        assert_eq!(sup.controller_states().len(), WorkerId::COUNT);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_goal_without_workers() {
        let (mut sup, _) = supervisor(&[WorkerId::Watcher]);
        sup.start().unwrap();
        let result = sup.wait_for_goal(Goal::Lint).await;
        assert!(matches!(result, Err(SupervisorError::NoWorkersForGoal(Goal::Lint))));
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_lint_goal_completes() {
        let (mut sup, launcher) = supervisor(&[]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Lint);

        let mut child = launcher.next_child().await.unwrap();
        assert_eq!(child.worker(), WorkerId::Linter);
        assert_eq!(
            tokio::time::timeout(WAIT, child.recv()).await.unwrap(),
            Some(Action::Lint)
        );
        child
            .send(Action::ToolDone {
                worker: WorkerId::Linter,
            })
            .unwrap();
        child
            .send(Action::WorkerDone {
                worker: WorkerId::Linter,
            })
            .unwrap();

        tokio::time::timeout(WAIT, sup.wait_for_goal(Goal::Lint))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(launcher.launches(), vec![WorkerId::Linter]);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_goal_failure_is_reported() {
        let (mut sup, launcher) = supervisor(&[]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Test);

        let child = launcher.next_child().await.unwrap();
        child
            .send(Action::WorkerError {
                worker: WorkerId::TestRunner,
                error: Failure::worker("2 tests failed"),
            })
            .unwrap();

        match tokio::time::timeout(WAIT, sup.wait_for_goal(Goal::Test))
            .await
            .unwrap()
        {
            Err(SupervisorError::GoalFailed { goal, failures }) => {
                assert_eq!(goal, Goal::Test);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, WorkerId::TestRunner);
                assert_eq!(failures[0].1.kind, FailureKind::WorkerFailure);
            }
            other => panic!("Expected GoalFailed, got {other:?}"),
        }
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_retry_relaunches_failed_worker() {
        let (mut sup, launcher) = supervisor(&[WorkerId::Bundler]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Build);

        let first = launcher.next_child().await.unwrap();
        first.exit(Some(3));
        let _ = tokio::time::timeout(WAIT, sup.wait_for_goal(Goal::Build))
            .await
            .unwrap();
        assert_eq!(sup.store().status(WorkerId::Bundler), WorkerStatus::Error);

        assert!(sup.foreman().retry(WorkerId::Bundler));
        let mut second = tokio::time::timeout(WAIT, launcher.next_child())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            tokio::time::timeout(WAIT, second.recv()).await.unwrap(),
            Some(Action::Bundle)
        );
        assert_eq!(launcher.launches(), vec![WorkerId::Bundler, WorkerId::Bundler]);
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_file_change_reaches_transpiler() {
        let (mut sup, launcher) = supervisor(&[WorkerId::Watcher, WorkerId::Transpiler]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Watch);

        let first = launcher.next_child().await.unwrap();
        let second = launcher.next_child().await.unwrap();
        let (mut transpiler, watcher) = if first.worker() == WorkerId::Transpiler {
            (first, second)
        } else {
            (second, first)
        };
        assert_eq!(watcher.worker(), WorkerId::Watcher);

        // The child also sees other foreman actions, such as the watcher's
        // WorkerBusy, so skip to the commands
        let is_transpile = |a: &Action| matches!(a, Action::Transpile { .. });
        assert_eq!(
            recv_matching(&mut transpiler, is_transpile).await,
            Action::Transpile { path: None }
        );

        watcher
            .send(Action::FileChanged {
                path: "src/app.js".to_string(),
            })
            .unwrap();
        assert_eq!(
            recv_matching(&mut transpiler, is_transpile).await,
            Action::Transpile {
                path: Some("src/app.js".to_string())
            }
        );
        sup.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_running_workers() {
        let (mut sup, launcher) = supervisor(&[WorkerId::Watcher]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Watch);

        let mut child = launcher.next_child().await.unwrap();
        child
            .send(Action::WorkerReady {
                worker: WorkerId::Watcher,
            })
            .unwrap();
        tokio::time::timeout(WAIT, sup.wait_for_goal(Goal::Watch))
            .await
            .unwrap()
            .unwrap();

        let store = sup.store().clone();
        let stopping = tokio::spawn(sup.shutdown());

        assert_eq!(
            tokio::time::timeout(WAIT, child.recv()).await.unwrap(),
            Some(Action::WorkerStop {
                worker: WorkerId::Watcher
            })
        );
        child.exit(Some(0));

        tokio::time::timeout(WAIT, stopping).await.unwrap().unwrap();
        assert_eq!(store.status(WorkerId::Watcher), WorkerStatus::Offline);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let (mut sup, launcher) = supervisor(&[WorkerId::Watcher]);
        sup.start().unwrap();
        sup.foreman().set_goal(Goal::Watch);

        // Never answers, so the stop can only end with the grace period
        let mut child = launcher.next_child().await.unwrap();
        let store = sup.store().clone();
        tokio::time::timeout(WAIT, sup.shutdown()).await.unwrap();

        assert_eq!(
            child.try_recv(),
            Some(Action::WorkerStop {
                worker: WorkerId::Watcher
            })
        );
        assert_eq!(store.status(WorkerId::Watcher), WorkerStatus::Stop);
    }
}
