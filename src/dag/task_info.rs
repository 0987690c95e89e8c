// src/dag/task_info.rs

//! Per-task bookkeeping kept by the scheduler.

use crate::engine::TaskName;
use crate::tasks::{TaskDef, TaskKind};
use crate::types::ReloadKind;

/// Where a task stands in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for upstream tasks.
    Pending,
    /// Handed to the executor.
    Running,
    /// Finished successfully; a service counts once it is serving.
    DoneSuccess,
    /// Failed, or blocked by a failed upstream task.
    DoneFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::DoneSuccess | RunState::DoneFailed)
    }
}

/// Run state as reported to callers outside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
}

impl From<Option<RunState>> for TaskRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::DoneSuccess) => TaskRunState::DoneSuccess,
            Some(RunState::DoneFailed) => TaskRunState::DoneFailed,
        }
    }
}

/// A pipeline task: what it is, what it waits on and how it has fared.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub kind: TaskKind,
    pub reload: Option<ReloadKind>,
    pub long_lived: bool,
    pub deps: Vec<TaskName>,

    /// `None` while the task is outside the current run.
    pub run_state: Option<RunState>,
    /// Re-run on its own after a file change, outside pipeline ordering.
    pub detached: bool,

    pub last_successful_run: Option<u64>,
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn from_def(def: &TaskDef, deps: Vec<TaskName>) -> Self {
        Self {
            name: def.name.to_string(),
            kind: def.kind,
            reload: def.reload,
            long_lived: def.kind.is_service(),
            deps,
            run_state: None,
            detached: false,
            last_successful_run: None,
            last_failed_run: None,
        }
    }

    /// Still pending or running in the current run.
    pub fn is_active(&self) -> bool {
        self.run_state.is_some_and(|state| !state.is_terminal())
    }

    pub fn has_run_before(&self) -> bool {
        self.last_successful_run.is_some() || self.last_failed_run.is_some()
    }
}

/// A task the executor should start now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub kind: TaskKind,
    /// Signal sent to browsers after a successful run.
    pub reload: Option<ReloadKind>,
    pub long_lived: bool,
    /// Run this dispatch belongs to; completions from older runs are stale.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            kind: info.kind,
            reload: info.reload,
            long_lived: info.long_lived,
            run_id,
        }
    }
}
