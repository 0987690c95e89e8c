// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - sending `ScheduledTask`s to the executor
//! - stopping services on shutdown
//!
//! The core is unit tested without any Tokio, channels, filesystem, or
//! servers.

use tracing::info;

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_task_completion, handle_task_progress, handle_task_trigger, CoreCommand, CoreStep,
    RunLedger,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunSummary, RuntimeEvent, RuntimeOptions, TaskName};
use crate::types::TriggerWhileRunningBehaviour;

/// Pure core runtime state.
///
/// This owns:
/// - the DAG scheduler
/// - the trigger queue
/// - the set of running services and the run summary
/// - runtime options (e.g. `exit_when_idle`)
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    ledger: RunLedger,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        let queue = TriggerQueue::new(behaviour, queue_length);
        Self {
            scheduler,
            queue,
            ledger: RunLedger::default(),
            options,
        }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Expose queue emptiness (for tests).
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Services that were dispatched and have not stopped.
    pub fn live_services(&self) -> impl Iterator<Item = &TaskName> {
        self.ledger.live_services.iter()
    }

    pub fn summary(&self) -> &RunSummary {
        &self.ledger.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.ledger.summary
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => handle_task_trigger(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.ledger,
                task,
                reason,
            ),
            RuntimeEvent::TaskProgressed { task } => handle_task_progress(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.ledger,
                &self.options,
                task,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &mut self.ledger,
                &self.options,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => {
                info!(
                    services = self.ledger.live_services.len(),
                    "shutdown requested"
                );
                CoreStep {
                    commands: vec![CoreCommand::Shutdown],
                    keep_running: false,
                }
            }
        }
    }
}
