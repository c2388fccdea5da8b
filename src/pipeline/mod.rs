//! Stage execution for dispatched work items.
//!
//! - [`PipelineExecutor`]: runs one stage per spawned task, then hands the
//!   item to its next stage or retires it
//! - [`ActiveWorkRegistry`]: bookkeeping of in-flight execution units, used
//!   for cancellation and swept periodically
//!
//! # Execution Flow
//!
//! 1. The dispatcher assigns an item to a worker and calls
//!    [`PipelineExecutor::launch`]
//! 2. The task waits for an execution slot, then sleeps for the stage
//!    duration without holding any lock
//! 3. The item is released from the worker's backlog and either re-queued
//!    for delivery or marked completed

pub mod executor;
pub mod registry;

pub use executor::{PipelineExecutor, StageTicket};
pub use registry::{ActiveUnit, ActiveWorkRegistry, UnitState};
