//! Foreman Supervisor Library
//!
//! This crate provides the supervision engine: the [`Store`] that owns the
//! current goal and the worker registry, the per-worker
//! [`WorkerController`] state machines, the process [`bridge`] relays and
//! the [`Foreman`] that declares goals.
//!
//! ```text
//! Foreman ──SetGoal──► Store ──► WorkerController (x6)
//!                        ▲              │ WorkerBusy, launch
//!                        │              ▼
//!          relay_from_process ◄── worker process ◄── relay_to_process
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod foreman;
pub mod report;
pub mod store;
pub mod supervisor;

pub use config::{SupervisorConfig, WorkerSpec};
pub use controller::{ControllerHandle, ControllerState, Reaction, WorkerController};
pub use error::SupervisorError;
pub use foreman::Foreman;
pub use store::{Origin, Published, Store, Subscription};
pub use supervisor::Supervisor;
