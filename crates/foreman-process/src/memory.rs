//! In-memory launcher: worker "processes" backed by channel pairs.
//!
//! Useful for embedding in-process workers and for driving the
//! supervisor deterministically in tests: every launch produces a
//! [`ChildEnd`] that plays the part of the worker program.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use foreman_core::{Action, WorkerId};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ProcessError;
use crate::handle::{Inbound, ProcessHandle};
use crate::launcher::Launch;

/// The worker side of an in-memory process.
#[derive(Debug)]
pub struct ChildEnd {
    worker: WorkerId,
    from_supervisor: mpsc::UnboundedReceiver<Action>,
    to_supervisor: mpsc::UnboundedSender<Inbound>,
}

impl ChildEnd {
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Wait for the next action sent to this worker.
    pub async fn recv(&mut self) -> Option<Action> {
        self.from_supervisor.recv().await
    }

    /// Take an already delivered action without waiting.
    pub fn try_recv(&mut self) -> Option<Action> {
        self.from_supervisor.try_recv().ok()
    }

    /// Emit an action to the supervisor.
    pub fn send(&self, action: Action) -> Result<(), ProcessError> {
        self.to_supervisor
            .send(Inbound::Action(action))
            .map_err(|_| ProcessError::ChannelClosed)
    }

    /// Emit a line the supervisor cannot parse.
    pub fn send_malformed(&self, reason: impl Into<String>) -> Result<(), ProcessError> {
        self.to_supervisor
            .send(Inbound::Malformed {
                reason: reason.into(),
            })
            .map_err(|_| ProcessError::ChannelClosed)
    }

    /// Terminate with the given exit code.
    pub fn exit(self, code: Option<i32>) {
        let _ = self.to_supervisor.send(Inbound::Exited { code });
    }
}

/// Launcher that hands out [`ChildEnd`]s instead of spawning processes.
pub struct MemoryLauncher {
    children_tx: mpsc::UnboundedSender<ChildEnd>,
    children_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ChildEnd>>,
    launches: Mutex<Vec<WorkerId>>,
    refused: Mutex<HashSet<WorkerId>>,
}

impl MemoryLauncher {
    pub fn new() -> Self {
        let (children_tx, children_rx) = mpsc::unbounded_channel();
        Self {
            children_tx,
            children_rx: tokio::sync::Mutex::new(children_rx),
            launches: Mutex::new(Vec::new()),
            refused: Mutex::new(HashSet::new()),
        }
    }

    /// Make every launch of `worker` fail.
    pub fn refuse(&self, worker: WorkerId) {
        self.refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(worker);
    }

    /// Every launch attempt so far, in order, including refused ones.
    pub fn launches(&self) -> Vec<WorkerId> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait for the next launched child.
    pub async fn next_child(&self) -> Option<ChildEnd> {
        self.children_rx.lock().await.recv().await
    }
}

impl Default for MemoryLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launch for MemoryLauncher {
    async fn launch(&self, worker: WorkerId) -> Result<ProcessHandle, ProcessError> {
        self.launches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(worker);

        let refused = self
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&worker);
        if refused {
            return Err(ProcessError::LaunchRefused(worker));
        }

        let (to_supervisor, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, from_supervisor) = mpsc::unbounded_channel();

        let child = ChildEnd {
            worker,
            from_supervisor,
            to_supervisor,
        };
        self.children_tx
            .send(child)
            .map_err(|_| ProcessError::ChannelClosed)?;

        debug!(worker = %worker, "In-memory worker launched");
        Ok(ProcessHandle::new(worker, inbound_rx, outbound_tx))
    }
}
