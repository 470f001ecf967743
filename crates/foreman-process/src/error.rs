//! Error types for worker process handling.

use foreman_core::WorkerId;
use thiserror::Error;

/// Errors that can occur while launching or talking to a worker process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn the worker process.
    #[error("Failed to spawn worker process '{program}': {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A stdio pipe was not available after spawning.
    #[error("Worker process has no {0} pipe")]
    MissingPipe(&'static str),

    /// The launcher refused to start this worker.
    #[error("Launch refused for worker '{0}'")]
    LaunchRefused(WorkerId),

    /// I/O error on a process pipe.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A line on the wire was not a valid action.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Channel to or from the process is closed.
    #[error("Channel closed")]
    ChannelClosed,
}
