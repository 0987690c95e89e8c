// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::dag::ScheduledTask;
use crate::engine::{TaskName, TaskOutcome};
use crate::pipeline::CompiledPipeline;

/// What changed in one scheduler step.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks whose dependencies are now met; dispatch these.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks that failed in this step.
    pub newly_failed: Vec<TaskName>,
    /// Dependents of a failed task that will not run in this run.
    pub newly_blocked: Vec<TaskName>,
    /// The step ended the current run.
    pub run_just_finished: bool,
}

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a triggered task is "ready" to run (deps satisfied)
/// - marking tasks as succeeded/failed/progressed
/// - scheduling dependents when appropriate
/// - failing dependents when a task fails
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a compiled pipeline.
    pub fn from_pipeline(compiled: &CompiledPipeline) -> Self {
        let graph = DagGraph::from_pipeline(compiled);

        let tasks = graph
            .tasks()
            .filter_map(|name| {
                let def = compiled.def(name)?;
                let deps = graph.dependencies_of(name).to_vec();
                Some((name.to_string(), TaskInfo::from_def(def, deps)))
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.into())
    }

    /// Whether `task` joined the active run as a detached (watch) re-run.
    pub fn is_detached(&self, task: &str) -> bool {
        self.current_run_id.is_some() && self.tasks.get(task).is_some_and(|info| info.detached)
    }

    /// Start a new run, resetting per-run state but keeping historical success
    /// information (for dependency satisfaction on later runs).
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
            info.detached = false;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new DAG run");
    }

    /// Trigger `task` together with everything downstream of it.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.trigger_step_internal(task, false).newly_scheduled
    }

    /// Trigger `task` alone, without waiting on or pulling in neighbours.
    pub fn handle_isolated_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.trigger_step_internal(task, true).newly_scheduled
    }

    /// Handle "progress" from a long-lived task (production API).
    pub fn handle_progress(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.progress_step_internal(task).newly_scheduled
    }

    /// Handle completion of a task with a concrete outcome (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Determine whether all tasks are in a terminal state and clear
    /// `current_run_id` if so.
    ///
    /// Returns `true` if this call transitioned the scheduler from running
    /// to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);

        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn trigger_step_internal(&mut self, task: &str, isolated: bool) -> SchedulerStep {
        if self.current_run_id.is_none() {
            debug!(
                task = %task,
                "trigger with no active run; implicitly starting a new run"
            );
            self.start_new_run();
        }

        if self.tasks.contains_key(task) {
            let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
            if isolated {
                manager.mark_detached_pending(task);
            } else {
                manager.mark_task_and_dependents_pending(task);
            }
        } else {
            warn!(task = %task, "trigger for unknown task; ignoring");
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    fn progress_step_internal(&mut self, task: &str) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            debug!(task = %task, "progress with no active run; ignoring");
            return SchedulerStep::default();
        };

        match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Running) => {
                debug!(
                    task = %info.name,
                    run_id,
                    "task reported progress; marking DoneSuccess for this run"
                );
                info.run_state = Some(RunState::DoneSuccess);
                info.last_successful_run = Some(run_id);
            }
            Some(info) => {
                debug!(
                    task = %info.name,
                    state = ?info.run_state,
                    "progress from task not running in this run; ignoring"
                );
                return SchedulerStep::default();
            }
            None => {
                warn!(task = %task, "progress from unknown task; ignoring");
                return SchedulerStep::default();
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            run_just_finished,
            ..SchedulerStep::default()
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            debug!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut step = SchedulerStep::default();

        match self.tasks.get_mut(task) {
            // Services that already progressed finish outside of any run.
            Some(info) if info.run_state != Some(RunState::Running) => {
                debug!(
                    task = %info.name,
                    state = ?info.run_state,
                    "completion from task not running in this run; ignoring"
                );
                return step;
            }
            Some(info) => match outcome {
                TaskOutcome::Success => {
                    info.run_state = Some(RunState::DoneSuccess);
                    info.last_successful_run = Some(run_id);
                    debug!(task = %info.name, run_id, "task completed successfully");
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    step.newly_scheduled = manager.collect_new_ready_tasks();
                }
                TaskOutcome::Failed(reason) => {
                    info.run_state = Some(RunState::DoneFailed);
                    info.last_failed_run = Some(run_id);
                    warn!(
                        task = %info.name,
                        run_id,
                        %reason,
                        "task failed; failing dependents in this run"
                    );
                    step.newly_failed.push(info.name.clone());
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.tasks, self.current_run_id);
                    step.newly_blocked = manager.mark_dependents_failed(task);
                }
            },
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }
}
