//! Leaf runtime: reads commands from stdin, writes actions to stdout.
//!
//! Every unit of work is preceded by `WorkerBusy`. A failed unit is
//! reported as `WorkerError(worker_failure)` and the program keeps serving
//! commands. The runtime exits on `WorkerStop` addressed to its worker or
//! when stdin closes.

use async_trait::async_trait;
use foreman_core::{Action, Failure, WorkerId};
use foreman_process::{LineReader, LineWriter, ProcessError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::LeafError;

/// Sending side of the worker's stdout.
#[derive(Debug, Clone)]
pub struct Outbox {
    worker: WorkerId,
    tx: mpsc::UnboundedSender<Action>,
}

impl Outbox {
    /// Create an outbox and the receiver draining it.
    pub fn channel(worker: WorkerId) -> (Self, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { worker, tx }, rx)
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn send(&self, action: Action) -> Result<(), LeafError> {
        trace!(action = action.kind(), "Emitting");
        self.tx.send(action).map_err(|_| LeafError::Closed)
    }

    pub fn busy(&self) -> Result<(), LeafError> {
        self.send(Action::WorkerBusy {
            worker: self.worker,
        })
    }

    pub fn ready(&self) -> Result<(), LeafError> {
        self.send(Action::WorkerReady {
            worker: self.worker,
        })
    }

    pub fn done(&self) -> Result<(), LeafError> {
        self.send(Action::WorkerDone {
            worker: self.worker,
        })
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), LeafError> {
        self.send(Action::WorkerError {
            worker: self.worker,
            error: Failure::worker(message),
        })
    }
}

/// The work a leaf process performs.
#[async_trait]
pub trait Program: Send {
    /// Called once before any command is read. Long-running programs start
    /// their work here.
    async fn start(&mut self, _out: &Outbox) -> Result<(), LeafError> {
        Ok(())
    }

    /// Returns true if `action` is a command this program executes.
    fn accepts(&self, action: &Action) -> bool;

    /// Execute one accepted command.
    async fn handle(&mut self, command: Action, out: &Outbox) -> Result<(), LeafError>;
}

/// Serve `program` over the given pipes until told to stop.
pub async fn run<R, W>(
    worker: WorkerId,
    mut program: Box<dyn Program>,
    input: R,
    output: W,
) -> Result<(), LeafError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out, rx) = Outbox::channel(worker);
    let writer = tokio::spawn(write_actions(rx, output));

    if worker.is_long_running() {
        out.busy()?;
    }
    if let Err(e) = program.start(&out).await {
        warn!(worker = %worker, error = %e, "Failed to start");
        out.error(e.to_string())?;
    }

    let mut reader = LineReader::new(input);
    loop {
        let action = match reader.read_action().await {
            Ok(Some(action)) => action,
            Ok(None) => {
                info!(worker = %worker, "Input closed, exiting");
                break;
            }
            Err(ProcessError::ProtocolError(reason)) => {
                warn!(worker = %worker, reason = %reason, "Ignoring malformed command");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if action == (Action::WorkerStop { worker }) {
            info!(worker = %worker, "Stop requested, exiting");
            break;
        }
        if !program.accepts(&action) {
            trace!(worker = %worker, action = action.kind(), "Ignoring action");
            continue;
        }

        debug!(worker = %worker, command = action.kind(), "Running command");
        out.busy()?;
        if let Err(e) = program.handle(action, &out).await {
            warn!(worker = %worker, error = %e, "Command failed");
            out.error(e.to_string())?;
        }
    }

    drop(program);
    drop(out);
    match writer.await {
        Ok(result) => result,
        Err(e) => {
            warn!(worker = %worker, error = %e, "Output writer failed");
            Ok(())
        }
    }
}

/// Drain the outbox into the output pipe. Ends once every outbox clone is
/// dropped.
async fn write_actions<W>(
    mut rx: mpsc::UnboundedReceiver<Action>,
    output: W,
) -> Result<(), LeafError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = LineWriter::new(output);
    while let Some(action) = rx.recv().await {
        writer.write_action(&action).await?;
    }
    Ok(())
}
