//! Dev server: long-running; keeps the configured server command alive and
//! reports an error if it exits.

use async_trait::async_trait;
use foreman_core::Action;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ToolCommand;
use crate::error::LeafError;
use crate::facilities::ProcessRunner;
use crate::runtime::{Outbox, Program};

pub struct DevServer {
    command: ToolCommand,
    server: Option<JoinHandle<()>>,
}

impl DevServer {
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            server: None,
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        // Aborting drops the child, which kills it
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

#[async_trait]
impl Program for DevServer {
    async fn start(&mut self, out: &Outbox) -> Result<(), LeafError> {
        let mut child = ProcessRunner::spawn(&self.command)?;
        info!(command = %self.command, pid = ?child.id(), "Dev server started");

        let command = self.command.to_string();
        let out_exit = out.clone();
        self.server = Some(tokio::spawn(async move {
            let message = match child.wait().await {
                Ok(status) => match status.code() {
                    Some(code) => format!("'{command}' exited with code {code}"),
                    None => format!("'{command}' terminated by signal"),
                },
                Err(e) => format!("failed to wait for '{command}': {e}"),
            };
            warn!(worker = %out_exit.worker(), message = %message, "Dev server stopped");
            let _ = out_exit.error(message);
        }));

        out.ready()
    }

    fn accepts(&self, _action: &Action) -> bool {
        false
    }

    async fn handle(&mut self, _command: Action, _out: &Outbox) -> Result<(), LeafError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::{Failure, WorkerId};
    use std::time::Duration;

    #[tokio::test]
    async fn test_server_exit_is_reported() {
        let mut server = DevServer::new(ToolCommand::parse("false").unwrap());
        let (out, mut rx) = Outbox::channel(WorkerId::DevServer);

        server.start(&out).await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(Action::WorkerReady {
                worker: WorkerId::DevServer
            })
        );
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap(),
            Some(Action::WorkerError {
                worker: WorkerId::DevServer,
                error: Failure::worker("'false' exited with code 1"),
            })
        );
    }

    #[tokio::test]
    async fn test_missing_server_fails_to_start() {
        let mut server = DevServer::new(ToolCommand::parse("foreman-no-such-server").unwrap());
        let (out, mut rx) = Outbox::channel(WorkerId::DevServer);

        assert!(matches!(
            server.start(&out).await,
            Err(LeafError::Spawn { .. })
        ));
        assert!(rx.try_recv().is_err());
    }
}
