//! Errors raised by leaf worker programs.

use foreman_process::ProcessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeafError {
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("Glob failed: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{tool}' exited with {}", exit_status(.code))]
    ToolFailed { tool: String, code: Option<i32> },

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProcessError),

    #[error("Empty command for {0}")]
    EmptyCommand(&'static str),

    #[error("Supervisor connection closed")]
    Closed,
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}
