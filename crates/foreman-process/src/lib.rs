//! Worker processes for Foreman
//!
//! This crate owns everything on the supervisor side of the process
//! boundary: launching a worker, the line-delimited JSON protocol spoken
//! over its stdio, and the [`ProcessHandle`] that exposes a live process as
//! a pair of channels.
//!
//! # Example
//!
//! ```rust,no_run
//! use foreman_core::{Action, WorkerId};
//! use foreman_process::{CommandLauncher, Inbound, Launch};
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let launcher = CommandLauncher::new("foreman-worker");
//!     let mut handle = launcher.launch(WorkerId::Transpiler).await?;
//!
//!     handle.send(Action::Transpile { path: None })?;
//!
//!     let mut inbound = handle.take_inbound().expect("fresh handle");
//!     while let Some(message) = inbound.recv().await {
//!         if let Inbound::Exited { code } = message {
//!             println!("exited with {code:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod handle;
mod launcher;
mod memory;
mod protocol;

pub use error::ProcessError;
pub use handle::{Inbound, ProcessHandle};
pub use launcher::{CommandLauncher, Launch};
pub use memory::{ChildEnd, MemoryLauncher};
pub use protocol::{decode_line, encode_line, LineReader, LineWriter};
