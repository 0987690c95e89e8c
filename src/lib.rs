// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::exec::{ExecContext, RealExecutorBackend};
use crate::pipeline::{CompiledPipeline, BUILTIN_PIPELINES};
use crate::server::ReloadHub;
use crate::tasks::BuildContext;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - pipeline compilation
/// - scheduler / queue / runtime
/// - executor (which starts the dev server and watcher when asked to)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    if args.list {
        print_list();
        return Ok(());
    }

    let (cfg, config_path) = config::resolve(args.config.as_deref())?;
    let root = project_root(config_path.as_deref());

    let pipeline = pipeline::resolve_target(&args.target)?;
    let compiled = pipeline::compile(&args.target, &pipeline)?
        .with_watch_targets(cfg.watch.bindings.iter().filter_map(|b| b.run.as_deref()))?;

    if args.dry_run {
        print_dry_run(&compiled, &root);
        return Ok(());
    }

    let scheduler = Scheduler::from_pipeline(&compiled);

    let behaviour = cfg.watch.triggered_while_running_behaviour;
    let queue_length = cfg.watch.queue_length;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = ExecContext {
        build: BuildContext::new(root.clone(), Arc::new(cfg)),
        reload: ReloadHub::new(),
    };
    let executor = RealExecutorBackend::new(ctx, rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let roots = compiled.roots();
    info!(
        pipeline = %compiled.name(),
        root = %root.display(),
        ?roots,
        "starting pipeline"
    );

    for task in roots {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::Manual,
            })
            .await?;
    }

    let core = CoreRuntime::new(scheduler, behaviour, queue_length, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, executor);
    let summary = runtime.run().await?;

    if summary.is_success() {
        info!(%summary, "pipeline finished");
        Ok(())
    } else {
        error!(%summary, "pipeline finished with failures");
        bail!("pipeline '{}' failed: {summary}", compiled.name())
    }
}

/// Project root: the directory of the config file, or the current
/// directory when running on defaults or with a bare file name.
fn project_root(config_path: Option<&Path>) -> PathBuf {
    match config_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_list() {
    println!("pipelines:");
    for name in BUILTIN_PIPELINES {
        if let Some(pipeline) = pipeline::builtin(name) {
            println!("  {name:<12} {pipeline}");
        }
    }
    println!();
    println!("tasks:");
    for def in tasks::TASKS {
        println!("  {:<12} {}", def.name, def.description);
    }
}

/// Print the compiled graph in execution order without running anything.
fn print_dry_run(compiled: &CompiledPipeline, root: &Path) {
    println!("sitepipe dry-run");
    println!("  pipeline: {}", compiled.name());
    println!("  root: {}", root.display());
    println!("  plan: {}", compiled.pipeline());
    println!();

    println!("tasks ({}):", compiled.order().len());
    for name in compiled.order() {
        let kind = match compiled.def(name) {
            Some(def) if def.kind.is_service() => " (service)",
            _ if compiled.watch_only().contains(name) => " (on change only)",
            _ => "",
        };
        println!("  - {name}{kind}");
        let deps = compiled.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {}", deps.join(", "));
        }
    }

    debug!("dry-run complete (no execution)");
}

