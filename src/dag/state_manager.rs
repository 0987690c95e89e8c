// src/dag/state_manager.rs

//! State transitions of a single pipeline run.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Mutable view over the task table for the run identified by `run_id`.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            run_id,
        }
    }

    /// Pull `root` and everything downstream of it into the run.
    ///
    /// Tasks already in the run keep their state.
    pub fn mark_task_and_dependents_pending(&mut self, root: &str) {
        let graph = self.graph;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut frontier = vec![root];

        while let Some(name) = frontier.pop() {
            if !seen.insert(name) {
                continue;
            }
            let Some(info) = self.tasks.get_mut(name) else {
                warn!(task = %name, "pipeline task missing from task table");
                continue;
            };
            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(task = %name, "joined run");
            }
            frontier.extend(graph.dependents_of(name).iter().map(String::as_str));
        }
    }

    /// Pull only `task` into the run, outside the pipeline ordering.
    ///
    /// Returns `false` if the task is unknown or already in the run.
    pub fn mark_detached_pending(&mut self, task: &str) -> bool {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "isolated trigger for unknown task");
            return false;
        };
        if info.run_state.is_some() {
            return false;
        }
        info.run_state = Some(RunState::Pending);
        info.detached = true;
        debug!(task = %task, "joined run in isolation");
        true
    }

    /// Fail every pending or running task downstream of `failed_task`.
    ///
    /// Isolated re-runs never wait on upstream tasks, so they are neither
    /// blocked nor walked through.
    ///
    /// Returns the tasks that were blocked, not including `failed_task`.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut frontier: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();
        let mut blocked = Vec::new();

        while let Some(name) = frontier.pop() {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            if !info.is_active() || info.detached {
                continue;
            }
            info.run_state = Some(RunState::DoneFailed);
            debug!(task = %name, upstream = %failed_task, "blocked by failed upstream task");
            frontier.extend(self.graph.dependents_of(&name).iter().cloned());
            blocked.push(name);
        }

        blocked
    }

    /// Move every pending task whose dependencies are met to `Running`.
    ///
    /// Candidates are visited in pipeline order so dispatch order is stable.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let tasks: &HashMap<TaskName, TaskInfo> = self.tasks;
        let ready: Vec<TaskName> = self
            .graph
            .tasks()
            .filter_map(|name| tasks.get(name))
            .filter(|info| info.run_state == Some(RunState::Pending))
            .filter(|info| deps_satisfied(tasks, info))
            .map(|info| info.name.clone())
            .collect();

        let run_id = self.run_id.unwrap_or(0);
        let mut scheduled = Vec::with_capacity(ready.len());
        for name in ready {
            let Some(info) = self.tasks.get_mut(&name) else {
                continue;
            };
            info!(
                task = %name,
                run_id,
                rerun = info.has_run_before(),
                detached = info.detached,
                "starting task"
            );
            info.run_state = Some(RunState::Running);
            scheduled.push(ScheduledTask::from_task_info(info, run_id));
        }
        scheduled
    }

    /// True when no task in the run is still pending or running.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(TaskInfo::is_active)
    }
}

/// Whether `info` may start in the current run.
///
/// A dependency in the run must have succeeded in it; a dependency outside
/// the run must have succeeded in some earlier run. Isolated tasks never
/// wait.
pub fn deps_satisfied(tasks: &HashMap<TaskName, TaskInfo>, info: &TaskInfo) -> bool {
    if info.detached {
        return true;
    }

    info.deps.iter().all(|dep_name| {
        let Some(dep) = tasks.get(dep_name) else {
            warn!(task = %info.name, dep = %dep_name, "dependency missing from task table");
            return false;
        };
        match dep.run_state {
            Some(RunState::DoneSuccess) => true,
            Some(_) => false,
            None => dep.last_successful_run.is_some(),
        }
    })
}
