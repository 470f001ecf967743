//! The store: single owner of the goal and the worker registry.
//!
//! Every action enters through [`Store::dispatch`], which folds it into the
//! state and broadcasts it to all subscriptions while holding the state
//! lock. Consequences:
//! - subscribers observe actions in publication order;
//! - by the time a subscriber sees an action, the registry already
//!   reflects it;
//! - a subscription buffers every action published after it was created
//!   (up to the bus capacity).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use foreman_core::{Action, Goal, Registry, WorkerId, WorkerStatus};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{trace, warn};

/// Who published an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The supervisor side: the foreman or a worker controller.
    Foreman,
    /// A worker process, relayed by the bridge.
    Worker(WorkerId),
}

/// An action as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub origin: Origin,
    pub action: Action,
}

/// Goal and registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub goal: Option<Goal>,
    pub registry: Registry,
}

impl Snapshot {
    fn apply(&self, action: &Action) -> Self {
        Self {
            goal: action.goal().or(self.goal),
            registry: self.registry.apply(action),
        }
    }
}

/// Shared action stream plus the state it drives.
pub struct Store {
    state: Mutex<Snapshot>,
    tx: broadcast::Sender<Published>,
}

impl Store {
    /// Create a store whose bus buffers up to `capacity` actions per
    /// subscription (minimum 1).
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            state: Mutex::new(Snapshot::default()),
            tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an action and fan it out to every subscription.
    pub fn dispatch(&self, origin: Origin, action: Action) {
        let mut state = self.lock();
        *state = state.apply(&action);
        trace!(origin = ?origin, action = action.kind(), "Dispatched");
        // No subscribers is fine: the state change already happened
        let _ = self.tx.send(Published { origin, action });
    }

    /// Dispatch an action on behalf of the foreman.
    pub fn publish(&self, action: Action) {
        self.dispatch(Origin::Foreman, action);
    }

    /// Start observing actions published from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Current goal, `None` until the first `SetGoal`.
    pub fn goal(&self) -> Option<Goal> {
        self.lock().goal
    }

    /// Current status of one worker.
    pub fn status(&self, worker: WorkerId) -> WorkerStatus {
        self.lock().registry.status(worker)
    }

    /// Copy of the registry.
    pub fn registry(&self) -> Registry {
        self.lock().registry.clone()
    }

    /// Copy of goal and registry.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }
}

/// A cursor into the action stream.
pub struct Subscription {
    rx: broadcast::Receiver<Published>,
}

impl Subscription {
    /// Wait for the next action. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Published> {
        loop {
            match self.rx.recv().await {
                Ok(published) => return Some(published),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscription lagged, actions dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next action matching `predicate`, discarding the rest.
    pub async fn take<F>(&mut self, mut predicate: F) -> Option<Published>
    where
        F: FnMut(&Published) -> bool,
    {
        loop {
            let published = self.recv().await?;
            if predicate(&published) {
                return Some(published);
            }
        }
    }

    /// Take an already buffered action without waiting.
    pub fn try_recv(&mut self) -> Option<Published> {
        loop {
            match self.rx.try_recv() {
                Ok(published) => return Some(published),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscription lagged, actions dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Turn the subscription into a stream, logging and skipping lag gaps.
    pub fn into_stream(self) -> impl Stream<Item = Published> + Send + Unpin {
        BroadcastStream::new(self.rx).filter_map(|item| match item {
            Ok(published) => Some(published),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Subscription stream lagged, actions dropped");
                None
            }
        })
    }
}
