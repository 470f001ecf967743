//! Process bridge: relays between a live worker process and the store.
//!
//! Two independent tasks per live process:
//! - [`relay_from_process`] turns every message from the child into an
//!   action published with [`Origin::Worker`];
//! - [`relay_to_process`] forwards every [`Origin::Foreman`] action to the
//!   child, verbatim.

use std::sync::Arc;

use foreman_core::{Action, Failure, FailureKind, WorkerId, WorkerStatus};
use foreman_process::Inbound;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::store::{Origin, Store, Subscription};

/// Outcome of relaying one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayStep {
    /// An action was published.
    Relayed(Action),
    /// The message violated the protocol; a `WorkerError` was published.
    Rejected(Failure),
    /// The process is gone; no further messages will arrive.
    Closed,
}

/// Wait for the next message from the child and publish it.
pub async fn relay_next(
    store: &Store,
    worker: WorkerId,
    inbound: &mut mpsc::UnboundedReceiver<Inbound>,
) -> RelayStep {
    match inbound.recv().await {
        Some(Inbound::Action(action)) => match action.status_change() {
            Some((addressed, _, _)) if addressed != worker => {
                let failure = Failure::protocol(format!(
                    "{worker} reported {} for {addressed}",
                    action.kind()
                ));
                reject(store, worker, failure)
            }
            _ => {
                debug!(worker = %worker, action = action.kind(), "Relaying from worker");
                store.dispatch(Origin::Worker(worker), action.clone());
                RelayStep::Relayed(action)
            }
        },
        Some(Inbound::Malformed { reason }) => reject(store, worker, Failure::protocol(reason)),
        Some(Inbound::Exited { code }) => {
            finish(store, worker, code == Some(0), exit_message(code));
            RelayStep::Closed
        }
        None => {
            finish(store, worker, true, String::new());
            RelayStep::Closed
        }
    }
}

/// Relay every message from the child until the process is gone.
pub async fn relay_from_process(
    store: Arc<Store>,
    worker: WorkerId,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
) {
    let mut relayed = 0u64;
    loop {
        match relay_next(&store, worker, &mut inbound).await {
            RelayStep::Relayed(_) => relayed += 1,
            RelayStep::Rejected(_) => {}
            RelayStep::Closed => break,
        }
    }
    debug!(worker = %worker, relayed, "Relay from process ended");
}

/// Forward foreman-originated actions to the child until it goes away.
pub async fn relay_to_process(
    worker: WorkerId,
    subscription: Subscription,
    outbound: mpsc::UnboundedSender<Action>,
) {
    let mut actions = subscription.into_stream();
    loop {
        tokio::select! {
            _ = outbound.closed() => break,
            next = actions.next() => match next {
                Some(published) if published.origin == Origin::Foreman => {
                    if outbound.send(published.action).is_err() {
                        break;
                    }
                }
                Some(_) => {}
                None => break,
            }
        }
    }
    debug!(worker = %worker, "Relay to process ended");
}

fn reject(store: &Store, worker: WorkerId, failure: Failure) -> RelayStep {
    warn!(worker = %worker, error = %failure, "Protocol violation");
    store.dispatch(
        Origin::Worker(worker),
        Action::WorkerError {
            worker,
            error: failure.clone(),
        },
    );
    RelayStep::Rejected(failure)
}

/// Publish the status a worker lands in once its process is gone.
///
/// An `Error` status is kept so the failure stays observable; a requested
/// stop or a clean exit goes `Offline`; anything else is an error.
fn finish(store: &Store, worker: WorkerId, clean: bool, message: String) {
    let status = store.status(worker);
    let action = match status {
        WorkerStatus::Error => return,
        WorkerStatus::Stop => Action::WorkerOffline { worker },
        _ if clean => Action::WorkerOffline { worker },
        _ => Action::WorkerError {
            worker,
            error: Failure::new(FailureKind::ProcessExited, message),
        },
    };
    info!(worker = %worker, previous = %status, action = action.kind(), "Worker process gone");
    store.dispatch(Origin::Worker(worker), action);
}

fn exit_message(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    }
}
