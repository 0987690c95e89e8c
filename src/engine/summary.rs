// src/engine/summary.rs

use std::fmt;

use crate::engine::TaskName;

/// Outcome of the pipeline run started from the command line.
///
/// Watch re-runs are not recorded: a failing rebuild during development is
/// reported in the log and the session keeps going.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<TaskName>,
    /// Failed tasks with their error messages.
    pub failed: Vec<(TaskName, String)>,
    /// Tasks that never ran because something before them failed.
    pub skipped: Vec<TaskName>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record_success(&mut self, task: &str) {
        if !self.succeeded.iter().any(|t| t == task) {
            self.succeeded.push(task.to_string());
        }
    }

    pub(crate) fn record_failure(&mut self, task: &str, reason: &str) {
        self.failed.push((task.to_string(), reason.to_string()));
    }

    pub(crate) fn record_skipped(&mut self, tasks: &[TaskName]) {
        self.skipped.extend(tasks.iter().cloned());
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped",
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        for (task, reason) in &self.failed {
            write!(f, "\n  {task}: {reason}")?;
        }
        Ok(())
    }
}
