//! Public façade for the task/stream coordination layer.
//!
//! ```text
//! start_task ──spawn──▶ drive_stream (worker) ──RelayMessage──▶ relay channel
//!                                                                   │
//! Presenter ◀──────────────── drain (event loop, fixed interval) ◀──┘
//! ```

pub mod coordinator;
pub mod relay;
pub mod traits;
pub mod types;

pub use coordinator::TaskCoordinator;
pub use relay::{RelayEvent, RelayMessage};
pub use traits::Presenter;
pub use types::{CoordinatorError, DrainReport, GenerationId, StartOutcome};

#[cfg(test)]
mod tests;
