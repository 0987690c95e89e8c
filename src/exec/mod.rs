// src/exec/mod.rs

//! Task execution layer.
//!
//! This module runs the leaf tasks the scheduler dispatches and reports
//! back to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop that tracks running tasks.
//! - [`task_runner`] runs one task: transforms on the blocking pool,
//!   services (dev server, watcher) until cancelled.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `RealExecutorBackend` used in production, which tests replace with a
//!   fake implementation.

use crate::server::ReloadHub;
use crate::tasks::BuildContext;

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::{spawn_executor, ExecRequest};

/// Shared state handed to every task run.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub build: BuildContext,
    /// Browsers are told to reload through this hub after tasks succeed.
    pub reload: ReloadHub,
}
