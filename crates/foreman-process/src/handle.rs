//! Live worker process exposed as a pair of channels.

use chrono::{DateTime, Duration, Utc};
use foreman_core::{Action, LaunchId, WorkerId};
use tokio::sync::{mpsc, oneshot};

use crate::error::ProcessError;

/// A message arriving from a worker process.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed action.
    Action(Action),
    /// A line that did not parse as an action.
    Malformed { reason: String },
    /// The process exited; always the last message.
    Exited { code: Option<i32> },
}

/// Handle to a launched worker process.
///
/// The handle is owned by whoever launched the process. Messages from the
/// child arrive on the inbound receiver (taken once with
/// [`ProcessHandle::take_inbound`]); actions for the child are sent through
/// the outbound sender. Dropping the handle terminates the process.
pub struct ProcessHandle {
    launch_id: LaunchId,
    worker: WorkerId,
    started_at: DateTime<Utc>,
    inbound: Option<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Action>,
    kill_switch: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// Wrap the two channel ends of a live process.
    pub fn new(
        worker: WorkerId,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        outbound: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            launch_id: LaunchId::generate(),
            worker,
            started_at: Utc::now(),
            inbound: Some(inbound),
            outbound,
            kill_switch: None,
        }
    }

    /// Attach a switch that terminates the process when fired or dropped.
    pub fn with_kill_switch(mut self, kill_switch: oneshot::Sender<()>) -> Self {
        self.kill_switch = Some(kill_switch);
        self
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn launch_id(&self) -> &LaunchId {
        &self.launch_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since launch.
    pub fn uptime(&self) -> Duration {
        Utc::now() - self.started_at
    }

    /// Take the inbound receiver. Returns `None` once taken.
    pub fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<Inbound>> {
        self.inbound.take()
    }

    /// A sender into the process's inbound channel.
    pub fn outbound(&self) -> mpsc::UnboundedSender<Action> {
        self.outbound.clone()
    }

    /// Send one action to the process.
    pub fn send(&self, action: Action) -> Result<(), ProcessError> {
        self.outbound
            .send(action)
            .map_err(|_| ProcessError::ChannelClosed)
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("launch_id", &self.launch_id)
            .field("worker", &self.worker)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_can_be_taken_once() {
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut handle = ProcessHandle::new(WorkerId::Linter, in_rx, out_tx);

        assert!(handle.take_inbound().is_some());
        assert!(handle.take_inbound().is_none());
    }

    #[test]
    fn test_send_fails_when_child_side_closed() {
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let handle = ProcessHandle::new(WorkerId::Linter, in_rx, out_tx);

        assert!(handle.send(Action::Lint).is_ok());
        drop(out_rx);
        assert!(matches!(
            handle.send(Action::Lint),
            Err(ProcessError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_drop_closes_switch() {
        let (_in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        let handle = ProcessHandle::new(WorkerId::Watcher, in_rx, out_tx).with_kill_switch(kill_tx);

        drop(handle);
        assert!(kill_rx.await.is_err());
    }
}
