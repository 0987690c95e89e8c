// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Scheduler, TaskRunState};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunSummary, RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Stop running services and wind down the executor.
    Shutdown,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Bookkeeping that outlives individual runs.
#[derive(Debug, Default)]
pub struct RunLedger {
    /// Services dispatched and not yet exited.
    pub live_services: BTreeSet<TaskName>,
    pub summary: RunSummary,
}

impl RunLedger {
    fn dispatch(&mut self, tasks: Vec<ScheduledTask>, commands: &mut Vec<CoreCommand>) {
        if tasks.is_empty() {
            return;
        }
        for task in tasks.iter().filter(|t| t.long_lived) {
            self.live_services.insert(task.name.clone());
        }
        commands.push(CoreCommand::DispatchTasks(tasks));
    }
}

/// Handle a task trigger event.
///
/// - If the scheduler is idle, start a new run seeded with this trigger
///   plus anything queued.
/// - If a run is active and `task` is not part of it, merge it into the
///   active run immediately.
/// - If `task` is already part of the active run, hand it to the queue so
///   it re-runs once the current run is over.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    ledger: &mut RunLedger,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    let mut commands = Vec::new();

    if scheduler.is_idle() {
        let mut isolated: BTreeSet<TaskName> = queue.drain_pending().into_iter().collect();
        let manual = match reason {
            TriggerReason::Manual => vec![task],
            TriggerReason::FileWatch => {
                isolated.insert(task);
                Vec::new()
            }
        };
        start_new_run(
            scheduler,
            ledger,
            manual,
            isolated.into_iter().collect(),
            &mut commands,
        );
        return CoreStep::running(commands);
    }

    match scheduler.run_state_of(&task) {
        None => {
            warn!(task = %task, "trigger for task outside the pipeline; ignoring");
        }
        Some(TaskRunState::NotInRun) => {
            let newly_ready = match reason {
                TriggerReason::Manual => scheduler.handle_trigger(&task),
                TriggerReason::FileWatch => scheduler.handle_isolated_trigger(&task),
            };
            ledger.dispatch(newly_ready, &mut commands);
        }
        Some(state) => {
            debug!(task = %task, ?state, "task already in this run; queueing re-run");
            queue.record_trigger(&task);
        }
    }

    CoreStep::running(commands)
}

/// Handle a service becoming ready.
pub fn handle_task_progress(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    ledger: &mut RunLedger,
    options: &RuntimeOptions,
    task: TaskName,
) -> CoreStep {
    let mut commands = Vec::new();

    if scheduler.run_state_of(&task) == Some(TaskRunState::Running) && !scheduler.is_detached(&task)
    {
        ledger.summary.record_success(&task);
    }
    info!(task = %task, "service ready");

    let newly_ready = scheduler.handle_progress(&task);
    ledger.dispatch(newly_ready, &mut commands);

    maybe_start_queued_run(scheduler, queue, ledger, &mut commands);
    finish_step(scheduler, queue, ledger, options, commands)
}

/// Handle a task completion event.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    ledger: &mut RunLedger,
    options: &RuntimeOptions,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let mut commands = Vec::new();

    let was_running = scheduler.run_state_of(&task) == Some(TaskRunState::Running);
    let detached = scheduler.is_detached(&task);
    let was_live = ledger.live_services.remove(&task);

    if was_live && !was_running {
        // A service that already reported ready has stopped.
        match &outcome {
            TaskOutcome::Success => info!(task = %task, "service stopped"),
            TaskOutcome::Failed(reason) => {
                warn!(task = %task, %reason, "service stopped unexpectedly");
                ledger.summary.record_failure(&task, reason);
            }
        }
    } else if was_running && !detached {
        match &outcome {
            TaskOutcome::Success => ledger.summary.record_success(&task),
            TaskOutcome::Failed(reason) => ledger.summary.record_failure(&task, reason),
        }
    }

    let step = scheduler.handle_completion(&task, outcome);
    if !step.newly_blocked.is_empty() {
        warn!(
            failed = %task,
            blocked = ?step.newly_blocked,
            "skipping tasks that depend on a failed task"
        );
        if !detached {
            ledger.summary.record_skipped(&step.newly_blocked);
        }
    }
    ledger.dispatch(step.newly_scheduled, &mut commands);

    maybe_start_queued_run(scheduler, queue, ledger, &mut commands);
    finish_step(scheduler, queue, ledger, options, commands)
}

/// Seed a new run: `manual` tasks pull in their dependents, `isolated`
/// tasks run alone.
pub fn start_new_run(
    scheduler: &mut Scheduler,
    ledger: &mut RunLedger,
    manual: Vec<TaskName>,
    isolated: Vec<TaskName>,
    commands: &mut Vec<CoreCommand>,
) {
    if manual.is_empty() && isolated.is_empty() {
        return;
    }

    scheduler.start_new_run();

    let mut all_ready = Vec::new();
    for task in &manual {
        all_ready.extend(scheduler.handle_trigger(task));
    }
    for task in &isolated {
        all_ready.extend(scheduler.handle_isolated_trigger(task));
    }

    ledger.dispatch(all_ready, commands);
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    ledger: &mut RunLedger,
    commands: &mut Vec<CoreCommand>,
) {
    if !scheduler.is_idle() {
        return;
    }

    let triggers = queue.drain_pending();
    if triggers.is_empty() {
        return;
    }

    info!(?triggers, "starting queued re-run");
    start_new_run(scheduler, ledger, Vec::new(), triggers, commands);
}

fn finish_step(
    scheduler: &Scheduler,
    queue: &TriggerQueue,
    ledger: &RunLedger,
    options: &RuntimeOptions,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    let done = options.exit_when_idle
        && scheduler.is_idle()
        && queue.is_empty()
        && ledger.live_services.is_empty();

    if done {
        commands.push(CoreCommand::Shutdown);
    }

    CoreStep {
        commands,
        keep_running: !done,
    }
}
