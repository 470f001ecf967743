//! Linter, test runner and bundler: one tool run per command.

use std::sync::Arc;

use async_trait::async_trait;
use foreman_core::{Action, WorkerId};

use crate::config::ToolCommand;
use crate::error::LeafError;
use crate::facilities::ToolRunner;
use crate::runtime::{Outbox, Program};

pub struct Tool {
    worker: WorkerId,
    command: ToolCommand,
    runner: Arc<dyn ToolRunner>,
}

impl Tool {
    pub fn new(worker: WorkerId, command: ToolCommand, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            worker,
            command,
            runner,
        }
    }
}

#[async_trait]
impl Program for Tool {
    fn accepts(&self, action: &Action) -> bool {
        matches!(
            (self.worker, action),
            (WorkerId::Linter, Action::Lint)
                | (WorkerId::TestRunner, Action::Test)
                | (WorkerId::Bundler, Action::Bundle)
        )
    }

    async fn handle(&mut self, _command: Action, out: &Outbox) -> Result<(), LeafError> {
        self.runner.run(&self.command).await?;
        out.send(Action::ToolDone {
            worker: self.worker,
        })?;
        out.done()
    }
}
