// src/exec/task_runner.rs

//! Running a single task.

use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::ExecContext;
use crate::server::DevServer;
use crate::tasks::{ServiceKind, TaskKind, TransformFn};
use crate::watch::{build_bindings, spawn_watcher};

/// Run one task and emit its `TaskCompleted` event.
///
/// - Transforms run on the blocking pool; on success the task's reload
///   signal (if any) goes out before completion is reported.
/// - Services report `TaskProgressed` once they are up, then run until the
///   cancel channel fires (or its sender is dropped).
pub async fn run_task(
    task: ScheduledTask,
    ctx: ExecContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let task_name = task.name.clone();
    let run_id = task.run_id;

    let result = match task.kind {
        TaskKind::Transform(transform) => run_transform(&task, transform, &ctx).await,
        TaskKind::Service(kind) => run_service(&task, kind, &ctx, &runtime_tx, cancel_rx).await,
    };

    let outcome = match result {
        Ok(()) => TaskOutcome::Success,
        Err(err) => {
            let message = format!("{err:#}");
            error!(task = %task_name, run_id, error = %message, "task failed");
            TaskOutcome::Failed(message)
        }
    };

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task_name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task_name, run_id, "runtime gone; completion not delivered");
    }
}

async fn run_transform(task: &ScheduledTask, transform: TransformFn, ctx: &ExecContext) -> Result<()> {
    info!(task = %task.name, run_id = task.run_id, "starting task");
    let started = Instant::now();

    let build = ctx.build.clone();
    let report = tokio::task::spawn_blocking(move || transform(&build))
        .await
        .with_context(|| format!("task '{}' panicked", task.name))??;

    info!(
        task = %task.name,
        run_id = task.run_id,
        written = report.written,
        skipped = report.skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "task finished"
    );

    if let Some(kind) = task.reload {
        ctx.reload.send(kind, task.name.clone());
    }
    Ok(())
}

async fn run_service(
    task: &ScheduledTask,
    kind: ServiceKind,
    ctx: &ExecContext,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) -> Result<()> {
    let config = &ctx.build.config;

    match kind {
        ServiceKind::DevServer => {
            let addr = format!("{}:{}", config.server.host, config.server.port);
            let server = DevServer::bind(&addr, ctx.build.app_dir(), ctx.reload.clone())
                .await
                .with_context(|| format!("binding dev server to {addr}"))?;

            info!(
                task = %task.name,
                url = %format!("http://{}", server.local_addr()?),
                "dev server ready"
            );
            report_ready(task, runtime_tx).await;

            server
                .run(async move {
                    let _ = cancel_rx.await;
                })
                .await
                .context("dev server failed")?;
            info!(task = %task.name, "dev server stopped");
        }
        ServiceKind::Watcher => {
            let bindings = build_bindings(&config.watch)?;
            let handle = spawn_watcher(
                ctx.build.root.clone(),
                bindings,
                runtime_tx.clone(),
                ctx.reload.clone(),
                config.watch.hash_storage_mode,
            )
            .context("starting file watcher")?;
            report_ready(task, runtime_tx).await;

            let _ = cancel_rx.await;
            drop(handle);
            info!(task = %task.name, "watcher stopped");
        }
    }

    Ok(())
}

async fn report_ready(task: &ScheduledTask, runtime_tx: &mpsc::Sender<RuntimeEvent>) {
    let _ = runtime_tx
        .send(RuntimeEvent::TaskProgressed {
            task: task.name.clone(),
        })
        .await;
}
