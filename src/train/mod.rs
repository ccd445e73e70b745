//! Training Orchestration
//!
//! The asynchronous actor-critic loop: per-worker rollout buffers, the
//! worker state machine, the coordinating thread with shared episode
//! bookkeeping, checkpointing, and the greedy validation pass.

pub mod checkpoint;
pub mod coordinator;
pub mod rollout;
pub mod validation;
pub mod worker;

pub use checkpoint::{Checkpointer, TrainingCheckpoint};
pub use coordinator::{TrainingState, WorkerCoordinator};
pub use rollout::{RolloutBuffer, StepSample};
pub use validation::{run_validation, ValidationSummary};
pub use worker::Worker;
