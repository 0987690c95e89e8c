// src/dag/mod.rs

//! Dependency-ordered execution of a compiled pipeline.
//!
//! [`DagGraph`] is the read-only adjacency view of the pipeline;
//! [`Scheduler`] tracks which tasks belong to the current run and hands
//! out the ones whose upstream tasks have succeeded.

pub mod graph;
pub mod scheduler;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use scheduler::{Scheduler, SchedulerStep};
pub use task_info::{ScheduledTask, TaskRunState};
