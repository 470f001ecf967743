//! Foreman Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Process management
//! - IPC transports
//! - Runtime specifics
//!
//! Everything that crosses a component or process boundary in Foreman is
//! an [`Action`]; the [`Registry`] is the pure reducer that folds status
//! actions into per-worker state.

pub mod action;
pub mod error;
pub mod goal;
pub mod ids;
pub mod registry;
pub mod status;
pub mod worker;

// Re-export commonly used types
pub use action::{Action, Failure, FailureKind};
pub use error::CoreError;
pub use goal::Goal;
pub use ids::LaunchId;
pub use registry::Registry;
pub use status::WorkerStatus;
pub use worker::{Worker, WorkerId};
