// src/exec/executor_loop.rs

//! Main executor loop that tracks running tasks.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::task_runner::run_task;
use crate::exec::ExecContext;

/// Requests accepted by the executor loop.
#[derive(Debug)]
pub enum ExecRequest {
    Run(ScheduledTask),
    /// Cancel every running service, wait for them to stop, then ack.
    Shutdown(oneshot::Sender<()>),
}

/// Internal handle for a running task.
///
/// - `cancel` stops a service; transforms ignore it and run to completion.
/// - `handle` is the Tokio task driving the run.
struct ActiveTask {
    cancel: Option<oneshot::Sender<()>>,
    long_lived: bool,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// The returned sender is what `RealExecutorBackend` uses. Each scheduled
/// task is executed in its own Tokio task, and **per task name there is
/// never more than one instance running at the same time**:
///
/// - A service that is already up satisfies the new request; a progress
///   event is synthesized for it.
/// - A transform that is still running rejects the new request with a
///   failure so the scheduler doesn't wait forever.
pub fn spawn_executor(
    ctx: ExecContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ExecRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // At most one ActiveTask per task name.
        let mut active: HashMap<String, ActiveTask> = HashMap::new();

        while let Some(request) = rx.recv().await {
            match request {
                ExecRequest::Run(task) => {
                    handle_scheduled_task(task, &mut active, &ctx, &runtime_tx).await;
                }
                ExecRequest::Shutdown(ack) => {
                    stop_services(&mut active).await;
                    let _ = ack.send(());
                    break;
                }
            }
        }

        info!("executor loop finished");
    });

    tx
}

/// Handle a newly scheduled task.
async fn handle_scheduled_task(
    task: ScheduledTask,
    active: &mut HashMap<String, ActiveTask>,
    ctx: &ExecContext,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let name = task.name.clone();

    if let Some(existing) = active.get(&name) {
        if !existing.handle.is_finished() {
            if task.long_lived {
                debug!(
                    task = %name,
                    run_id = task.run_id,
                    "service already running; synthesizing progress event"
                );
                let _ = runtime_tx
                    .send(RuntimeEvent::TaskProgressed { task: name })
                    .await;
            } else {
                warn!(
                    task = %name,
                    run_id = task.run_id,
                    "task is still running from an earlier request; rejecting"
                );
                let _ = runtime_tx
                    .send(RuntimeEvent::TaskCompleted {
                        task: name,
                        outcome: TaskOutcome::Failed("already running".to_string()),
                    })
                    .await;
            }
            return;
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let long_lived = task.long_lived;
    let rt_tx = runtime_tx.clone();
    let task_ctx = ctx.clone();
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        run_task(task, task_ctx, rt_tx, cancel_rx).await;
        debug!(task = %spawn_name, "task runner future finished");
    });

    active.insert(
        name,
        ActiveTask {
            cancel: Some(cancel_tx),
            long_lived,
            handle,
        },
    );
}

/// Cancel running services and wait for them to finish.
async fn stop_services(active: &mut HashMap<String, ActiveTask>) {
    for (name, mut task) in active.drain() {
        if !task.long_lived || task.handle.is_finished() {
            continue;
        }

        info!(task = %name, "stopping service");
        if let Some(cancel) = task.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(task = %name, "service already finished while cancelling");
            }
        }
        if let Err(err) = task.handle.await {
            warn!(task = %name, error = %err, "service task ended abnormally");
        }
    }
}
