//! Supervisor configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use foreman_core::{Action, Goal, WorkerId};

/// Which goals a worker serves and how it is activated once launched.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    /// The worker this spec applies to.
    pub worker: WorkerId,

    /// Goals under which the worker must run.
    pub goals: BTreeSet<Goal>,

    /// Command sent right after launch, for workers that wait for one.
    pub activation: Option<Action>,
}

impl WorkerSpec {
    /// A spec serving no goals and with no activation command.
    pub fn new(worker: WorkerId) -> Self {
        Self {
            worker,
            goals: BTreeSet::new(),
            activation: None,
        }
    }

    /// Builder method to serve the given goals.
    pub fn serving(mut self, goals: impl IntoIterator<Item = Goal>) -> Self {
        self.goals.extend(goals);
        self
    }

    /// Builder method to set the activation command.
    pub fn with_activation(mut self, action: Action) -> Self {
        self.activation = Some(action);
        self
    }

    /// Returns true if the worker must run under `goal`.
    pub fn serves(&self, goal: Goal) -> bool {
        self.goals.contains(&goal)
    }

    /// The stock wiring of goals and activation commands.
    pub fn default_for(worker: WorkerId) -> Self {
        let spec = Self::new(worker);
        match worker {
            WorkerId::Watcher => spec.serving([Goal::Watch, Goal::Serve]),
            WorkerId::DevServer => spec.serving([Goal::Serve]),
            WorkerId::Transpiler => spec
                .serving([Goal::Watch, Goal::Build, Goal::Serve])
                .with_activation(Action::Transpile { path: None }),
            WorkerId::Bundler => spec
                .serving([Goal::Build])
                .with_activation(Action::Bundle),
            WorkerId::Linter => spec.serving([Goal::Lint]).with_activation(Action::Lint),
            WorkerId::TestRunner => spec.serving([Goal::Test]).with_activation(Action::Test),
        }
    }
}

/// Supervisor configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Program launched for every worker; the worker name is appended.
    pub worker_program: String,

    /// Extra arguments placed before the worker name.
    pub worker_args: Vec<String>,

    /// Per-subscription buffer of the action bus.
    pub bus_capacity: usize,

    /// How long a controller waits for ready/done (`None` waits forever).
    pub readiness_timeout: Option<Duration>,

    /// How long shutdown waits for workers to stop before killing them.
    pub shutdown_grace: Duration,

    /// One entry per supervised worker.
    pub workers: Vec<WorkerSpec>,
}

impl SupervisorConfig {
    /// Spec for one worker, if it is supervised.
    pub fn spec(&self, worker: WorkerId) -> Option<&WorkerSpec> {
        self.workers.iter().find(|spec| spec.worker == worker)
    }

    /// Workers that must run under `goal`.
    pub fn workers_for(&self, goal: Goal) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|spec| spec.serves(goal))
            .map(|spec| spec.worker)
            .collect()
    }

    /// Restrict supervision to the given workers. An empty list keeps all.
    pub fn only(mut self, workers: &[WorkerId]) -> Self {
        if !workers.is_empty() {
            self.workers.retain(|spec| workers.contains(&spec.worker));
        }
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_program: "foreman-worker".to_string(),
            worker_args: Vec::new(),
            bus_capacity: 1024,
            readiness_timeout: Some(Duration::from_secs(60)),
            shutdown_grace: Duration::from_secs(5),
            workers: WorkerId::ALL.map(WorkerSpec::default_for).to_vec(),
        }
    }
}
