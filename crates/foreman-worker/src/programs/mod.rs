//! The program each worker runs.

mod dev_server;
mod tool;
mod transpiler;
mod watcher;

use std::sync::Arc;

use foreman_core::WorkerId;

pub use dev_server::DevServer;
pub use tool::Tool;
pub use transpiler::{TranspileSettings, Transpiler};
pub use watcher::Watcher;

use crate::config::WorkerConfig;
use crate::facilities::{CommandTranspiler, FsGlob, ProcessRunner};
use crate::runtime::Program;

/// Build the program for `worker` from the configuration.
pub fn program_for(worker: WorkerId, config: &WorkerConfig) -> Box<dyn Program> {
    let runner = Arc::new(ProcessRunner);
    match worker {
        WorkerId::Transpiler => Box::new(Transpiler::new(
            Arc::new(FsGlob),
            Arc::new(CommandTranspiler::new(config.transpiler.clone())),
            TranspileSettings {
                pattern: config.pattern.clone(),
                base_dir: config.src_dir.clone(),
                out_dir: config.out_dir.clone(),
                source_maps: config.source_maps,
            },
        )),
        WorkerId::Linter => Box::new(Tool::new(worker, config.lint.clone(), runner)),
        WorkerId::TestRunner => Box::new(Tool::new(worker, config.test.clone(), runner)),
        WorkerId::Bundler => Box::new(Tool::new(worker, config.bundle.clone(), runner)),
        WorkerId::Watcher => Box::new(Watcher::new(config.src_dir.clone())),
        WorkerId::DevServer => Box::new(DevServer::new(config.serve.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::Action;

    #[test]
    fn test_each_worker_accepts_its_activation() {
        let config = WorkerConfig::default();
        let cases = [
            (WorkerId::Transpiler, Action::Transpile { path: None }),
            (WorkerId::Linter, Action::Lint),
            (WorkerId::TestRunner, Action::Test),
            (WorkerId::Bundler, Action::Bundle),
        ];
        for (worker, activation) in cases {
            let program = program_for(worker, &config);
            assert!(program.accepts(&activation), "{worker} rejects {activation:?}");
        }
        for worker in [WorkerId::Watcher, WorkerId::DevServer] {
            assert!(!program_for(worker, &config).accepts(&Action::Lint));
        }
    }
}
