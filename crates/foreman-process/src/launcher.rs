//! Launching worker processes.

use std::process::Stdio;

use async_trait::async_trait;
use foreman_core::{Action, WorkerId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::ProcessError;
use crate::handle::{Inbound, ProcessHandle};
use crate::protocol::{LineReader, LineWriter};

/// Process-launch facility: turns a worker id into a live process.
#[async_trait]
pub trait Launch: Send + Sync {
    /// Start the process for `worker` and return its handle.
    async fn launch(&self, worker: WorkerId) -> Result<ProcessHandle, ProcessError>;
}

/// Launches workers as OS child processes.
///
/// The worker's wire name is appended as the last argument, so a launcher
/// built with `CommandLauncher::new("foreman-worker")` runs
/// `foreman-worker watcher` for the watcher.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    /// Program to execute.
    program: String,

    /// Arguments placed before the worker name.
    args: Vec<String>,
}

impl CommandLauncher {
    /// Create a launcher for the given worker program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument placed before the worker name.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, worker: WorkerId) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(worker.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Launch for CommandLauncher {
    async fn launch(&self, worker: WorkerId) -> Result<ProcessHandle, ProcessError> {
        let mut cmd = self.command(worker);
        debug!("Full command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| {
            error!(worker = %worker, error = %e, "Failed to spawn worker process");
            ProcessError::SpawnError {
                program: self.program.clone(),
                source: e,
            }
        })?;

        let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(ProcessError::MissingPipe("stderr"))?;

        info!(worker = %worker, pid = ?child.id(), "Worker process spawned");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        tokio::spawn(forward_stderr(worker, stderr));
        tokio::spawn(write_stdin(worker, stdin, outbound_rx));
        let reader = tokio::spawn(read_stdout(worker, stdout, inbound_tx.clone()));

        // Exit waiter: owns the child, reports the exit after stdout drained
        tokio::spawn(async move {
            let finished = tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut kill_rx => None,
            };
            let status = match finished {
                Some(status) => status,
                None => {
                    info!(worker = %worker, "Terminating worker process");
                    if let Err(e) = child.kill().await {
                        warn!(worker = %worker, error = %e, "Failed to kill worker process");
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    error!(worker = %worker, error = %e, "Failed to wait for worker process");
                    None
                }
            };
            let _ = reader.await;
            info!(worker = %worker, exit_code = ?code, "Worker process exited");
            let _ = inbound_tx.send(Inbound::Exited { code });
        });

        Ok(ProcessHandle::new(worker, inbound_rx, outbound_tx).with_kill_switch(kill_tx))
    }
}

/// Pump stdout lines into the inbound channel.
async fn read_stdout(
    worker: WorkerId,
    stdout: ChildStdout,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let mut reader = LineReader::new(stdout);
    loop {
        let message = match reader.read_action().await {
            Ok(Some(action)) => Inbound::Action(action),
            Ok(None) => {
                debug!(worker = %worker, total_messages = reader.lines_read(), "Worker stdout closed (EOF)");
                break;
            }
            Err(ProcessError::ProtocolError(reason)) => {
                warn!(worker = %worker, reason = %reason, "Malformed line from worker");
                Inbound::Malformed { reason }
            }
            Err(e) => {
                error!(worker = %worker, error = %e, "Error reading worker stdout");
                break;
            }
        };
        if inbound.send(message).is_err() {
            break;
        }
    }
}

/// Pump outbound actions into stdin.
async fn write_stdin(
    worker: WorkerId,
    stdin: ChildStdin,
    mut outbound: mpsc::UnboundedReceiver<Action>,
) {
    let mut writer = LineWriter::new(stdin);
    while let Some(action) = outbound.recv().await {
        if let Err(e) = writer.write_action(&action).await {
            debug!(worker = %worker, error = %e, "Worker stdin closed");
            break;
        }
    }
}

/// Forward the worker's log stream into ours.
async fn forward_stderr(worker: WorkerId, stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    info!(worker = %worker, "{}", trimmed);
                }
            }
            Err(e) => {
                error!(worker = %worker, error = %e, "Error reading worker stderr");
                break;
            }
        }
    }
}
