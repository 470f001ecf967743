//! Worker controller: the per-worker state machine.
//!
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!       Watching ──SetGoal──► served? ──no──────────────────┤
//!                                │ yes                      │
//!                                ▼                          │
//!                       status == Offline? ──no─────────────┤
//!                                │ yes                      │
//!                                ▼                          │
//!       Launching: publish WorkerBusy, launch,              │
//!                  spawn relays, send activation            │
//!                                │ (launch error ───────────┤)
//!                                ▼                          │
//!       AwaitingReadiness: take Ready/Done/Error for        │
//!                          this worker (or time out) ───────┘
//! ```
//!
//! The controller's sequential task body is the only place its worker is
//! launched from, so a worker never has two launches in flight.

use std::sync::Arc;
use std::time::Duration;

use foreman_core::{Action, Failure, FailureKind, Goal, WorkerId, WorkerStatus};
use foreman_process::{Launch, ProcessHandle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::bridge::{relay_from_process, relay_to_process};
use crate::config::WorkerSpec;
use crate::store::{Store, Subscription};

/// Observable state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Blocked waiting for the next `SetGoal`.
    Watching,
    /// Publishing `WorkerBusy` and starting the process.
    Launching,
    /// Blocked until the worker settles or its process goes away.
    AwaitingReadiness,
    /// Shut down; the process (if any) was terminated.
    Stopped,
}

/// What a controller did in response to one goal.
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// The goal is not served by this worker.
    NotServed,
    /// The worker was not `Offline`; nothing launched.
    AlreadyActive(WorkerStatus),
    /// The process could not be started; `WorkerError` was published.
    LaunchFailed,
    /// The worker settled in this status.
    Settled(WorkerStatus),
    /// The worker did not settle in time; `WorkerError` was published.
    TimedOut,
    /// The process went offline or was stopped before settling.
    Exited(WorkerStatus),
    /// The action stream closed while waiting.
    Closed,
}

/// A launched process and the two relay tasks attached to it.
struct LiveProcess {
    handle: ProcessHandle,
    relays: [JoinHandle<()>; 2],
}

impl Drop for LiveProcess {
    fn drop(&mut self) {
        for relay in &self.relays {
            relay.abort();
        }
        debug!(
            worker = %self.handle.worker(),
            launch_id = %self.handle.launch_id(),
            uptime_ms = self.handle.uptime().num_milliseconds(),
            "Releasing worker process"
        );
    }
}

/// Supervises one worker.
pub struct WorkerController {
    spec: WorkerSpec,
    store: Arc<Store>,
    launcher: Arc<dyn Launch>,
    readiness_timeout: Option<Duration>,
    actions: Subscription,
    state: watch::Sender<ControllerState>,
    process: Option<LiveProcess>,
}

impl WorkerController {
    /// Create a controller. It observes every action published from this
    /// point on, even before it is spawned.
    pub fn new(
        spec: WorkerSpec,
        store: Arc<Store>,
        launcher: Arc<dyn Launch>,
        readiness_timeout: Option<Duration>,
    ) -> Self {
        let actions = store.subscribe();
        let (state, _) = watch::channel(ControllerState::Watching);
        Self {
            spec,
            store,
            launcher,
            readiness_timeout,
            actions,
            state,
            process: None,
        }
    }

    pub fn worker(&self) -> WorkerId {
        self.spec.worker
    }

    /// Observe state changes.
    pub fn state(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Run the controller as a background task.
    pub fn spawn(self, shutdown: CancellationToken) -> ControllerHandle {
        let worker = self.worker();
        let state = self.state();
        let join = tokio::spawn(self.run(shutdown));
        ControllerHandle {
            worker,
            state,
            join,
        }
    }

    /// Main loop: watch for goals and react to each until shut down.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let worker = self.worker();
        info!(worker = %worker, goals = ?self.spec.goals, "Worker controller started");

        loop {
            self.set_state(ControllerState::Watching);

            let goal = tokio::select! {
                _ = shutdown.cancelled() => break,
                goal = self.next_goal() => match goal {
                    Some(goal) => goal,
                    None => break,
                },
            };

            let reaction = tokio::select! {
                _ = shutdown.cancelled() => break,
                reaction = self.react(goal) => reaction,
            };
            debug!(worker = %worker, goal = %goal, reaction = ?reaction, "Reacted to goal");

            if reaction == Reaction::Closed {
                break;
            }
        }

        self.process = None;
        self.set_state(ControllerState::Stopped);
        info!(worker = %worker, "Worker controller stopped");
    }

    /// Block until the next `SetGoal`.
    pub async fn next_goal(&mut self) -> Option<Goal> {
        self.actions
            .take(|published| published.action.goal().is_some())
            .await
            .and_then(|published| published.action.goal())
    }

    /// React to one goal change; returns once the controller is back to
    /// watching.
    pub async fn react(&mut self, goal: Goal) -> Reaction {
        let worker = self.worker();

        if !self.spec.serves(goal) {
            trace!(worker = %worker, goal = %goal, "Goal not served");
            return Reaction::NotServed;
        }

        let status = self.store.status(worker);
        if !status.is_launchable() {
            debug!(worker = %worker, status = %status, "Worker already active, not launching");
            return Reaction::AlreadyActive(status);
        }

        self.set_state(ControllerState::Launching);
        self.store.publish(Action::WorkerBusy { worker });

        let handle = match self.launcher.launch(worker).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(worker = %worker, error = %e, "Failed to launch worker");
                self.store.publish(Action::WorkerError {
                    worker,
                    error: Failure::launch(e.to_string()),
                });
                return Reaction::LaunchFailed;
            }
        };
        info!(worker = %worker, launch_id = %handle.launch_id(), goal = %goal, "Worker launched");

        if let Err(failure) = self.attach(handle) {
            self.store.publish(Action::WorkerError {
                worker,
                error: failure,
            });
            return Reaction::LaunchFailed;
        }

        self.set_state(ControllerState::AwaitingReadiness);
        self.await_readiness().await
    }

    /// Wire the bridge relays to a fresh process and send its activation.
    fn attach(&mut self, mut handle: ProcessHandle) -> Result<(), Failure> {
        let worker = self.worker();
        let inbound = handle
            .take_inbound()
            .ok_or_else(|| Failure::launch("process inbound channel already taken"))?;

        let from = tokio::spawn(relay_from_process(self.store.clone(), worker, inbound));
        let to = tokio::spawn(relay_to_process(
            worker,
            self.store.subscribe(),
            handle.outbound(),
        ));

        // Replacing a previous process terminates it and its relays
        self.process = Some(LiveProcess {
            handle,
            relays: [from, to],
        });

        if let Some(activation) = self.spec.activation.clone() {
            debug!(worker = %worker, action = activation.kind(), "Sending activation");
            self.store.publish(activation);
        }
        Ok(())
    }

    async fn await_readiness(&mut self) -> Reaction {
        let worker = self.worker();
        let limit = self.readiness_timeout;
        let wait = self.actions.take(|published| {
            published.action.settles(worker) || published.action.exits(worker)
        });

        let settled = match limit {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(settled) => settled,
                Err(_) => {
                    warn!(worker = %worker, timeout = ?limit, "Worker did not become ready");
                    self.process = None;
                    self.store.publish(Action::WorkerError {
                        worker,
                        error: Failure::new(
                            FailureKind::Timeout,
                            format!("not ready after {}ms", limit.as_millis()),
                        ),
                    });
                    return Reaction::TimedOut;
                }
            },
            None => wait.await,
        };

        let status = settled.and_then(|published| {
            published
                .action
                .status_change()
                .map(|(_, status, _)| status)
        });
        match status {
            Some(status @ (WorkerStatus::Offline | WorkerStatus::Stop)) => {
                info!(worker = %worker, status = %status, "Worker exited before settling");
                Reaction::Exited(status)
            }
            Some(status) => {
                info!(worker = %worker, status = %status, "Worker settled");
                Reaction::Settled(status)
            }
            None => Reaction::Closed,
        }
    }

    fn set_state(&self, state: ControllerState) {
        self.state.send_replace(state);
    }
}

/// Handle to a spawned controller task.
pub struct ControllerHandle {
    worker: WorkerId,
    state: watch::Receiver<ControllerState>,
    join: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        *self.state.borrow()
    }

    /// Wait until the controller reaches `state`.
    pub async fn wait_for(&mut self, state: ControllerState) -> bool {
        self.state.wait_for(|current| *current == state).await.is_ok()
    }

    /// Wait for the controller task to finish.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            warn!(worker = %self.worker, error = %e, "Worker controller task failed");
        }
    }
}
