// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RunSummary, RuntimeEvent};

/// Async shell around [`CoreRuntime`].
///
/// Events from the watcher, the executor and the Ctrl-C handler arrive on
/// `event_rx`; the core decides what to do and this loop carries the
/// resulting commands out against the executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    executor_stopped: bool,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("executor_stopped", &self.executor_stopped)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
            executor_stopped: false,
        }
    }

    /// Run until the core says stop or every event sender is gone, then
    /// return what the pipeline run achieved.
    ///
    /// Services still running at that point are stopped through the
    /// executor before returning.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime event");
            let step = self.core.step(event);

            for command in step.commands {
                self.apply(command).await?;
            }

            if !step.keep_running {
                info!("pipeline finished; stopping runtime");
                break;
            }
        }

        if !self.executor_stopped {
            self.executor.shutdown().await?;
        }

        info!("runtime stopped");
        Ok(self.core.into_summary())
    }

    async fn apply(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) if tasks.is_empty() => Ok(()),
            CoreCommand::DispatchTasks(tasks) => {
                debug!(
                    tasks = ?tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
                    run_id = tasks[0].run_id,
                    "dispatching"
                );
                self.executor.spawn_ready_tasks(tasks).await
            }
            CoreCommand::Shutdown => {
                debug!("stopping executor");
                self.executor_stopped = true;
                self.executor.shutdown().await
            }
        }
    }
}
