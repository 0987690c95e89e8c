// tests/core_runtime.rs

//! Drives `CoreRuntime` step by step, without an executor or channels.

use std::error::Error;

use sitepipe::dag::Scheduler;
use sitepipe::engine::{
    CoreCommand, CoreRuntime, CoreStep, RuntimeEvent, RuntimeOptions, TaskOutcome, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use sitepipe::pipeline::{self, compile};

type TestResult = Result<(), Box<dyn Error>>;

fn core_for(target: &str, behaviour: TriggerWhileRunningBehaviour) -> Result<CoreRuntime, Box<dyn Error>> {
    let pipeline = pipeline::resolve_target(target)?;
    let compiled = compile(target, &pipeline)?;
    Ok(CoreRuntime::new(
        Scheduler::from_pipeline(&compiled),
        behaviour,
        1,
        RuntimeOptions::default(),
    ))
}

fn dispatched(step: &CoreStep) -> Vec<String> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t| t.name.clone())),
            CoreCommand::Shutdown => None,
        })
        .flatten()
        .collect()
}

fn requests_shutdown(step: &CoreStep) -> bool {
    step.commands
        .iter()
        .any(|c| matches!(c, CoreCommand::Shutdown))
}

fn manual(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason: TriggerReason::Manual,
    }
}

fn file_watch(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason: TriggerReason::FileWatch,
    }
}

fn completed(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        task: task.to_string(),
        outcome: TaskOutcome::Success,
    }
}

fn failed(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskCompleted {
        task: task.to_string(),
        outcome: TaskOutcome::Failed("boom".to_string()),
    }
}

fn progressed(task: &str) -> RuntimeEvent {
    RuntimeEvent::TaskProgressed {
        task: task.to_string(),
    }
}

/// Run the default pipeline up to the point where both services are ready.
fn bring_up_default(core: &mut CoreRuntime) -> Vec<String> {
    let mut order = Vec::new();
    let mut ready = dispatched(&core.step(manual("html_include")));

    while let Some(task) = ready.first().cloned() {
        if task == "serve" || task == "watch" {
            break;
        }
        assert_eq!(ready.len(), 1, "transforms of the default pipeline run one at a time");
        order.push(task.clone());
        ready = dispatched(&core.step(completed(&task)));
    }

    let mut services = ready.clone();
    services.sort();
    assert_eq!(services, ["serve", "watch"]);

    for service in &ready {
        let step = core.step(progressed(service));
        assert!(step.keep_running);
        assert!(!requests_shutdown(&step));
    }
    order
}

#[test]
fn build_pipeline_requests_shutdown_once_done() -> TestResult {
    let mut core = core_for("build", TriggerWhileRunningBehaviour::Queue)?;

    let step = core.step(manual("clean_dist"));
    assert_eq!(dispatched(&step), ["clean_dist"]);
    assert!(step.keep_running);

    let step = core.step(completed("clean_dist"));
    assert_eq!(dispatched(&step), ["copy_dist"]);
    assert!(step.keep_running);

    let step = core.step(completed("copy_dist"));
    assert!(dispatched(&step).is_empty());
    assert!(requests_shutdown(&step));
    assert!(!step.keep_running);

    assert!(core.is_idle());
    assert!(core.queue_is_empty());
    assert_eq!(core.summary().succeeded, ["clean_dist", "copy_dist"]);
    Ok(())
}

#[test]
fn default_pipeline_runs_transforms_in_declared_order() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    let order = bring_up_default(&mut core);

    assert_eq!(
        order,
        [
            "html_include",
            "html_minify",
            "scripts",
            "styles",
            "images",
            "svg_sprites",
            "avif_images",
            "webp_images",
            "favicons",
            "woff",
            "woff2",
        ]
    );

    let mut live: Vec<_> = core.live_services().cloned().collect();
    live.sort();
    assert_eq!(live, ["serve", "watch"]);
    assert!(core.is_idle());
    assert!(core.summary().is_success());
    assert_eq!(core.summary().succeeded.len(), 13);
    Ok(())
}

#[test]
fn file_watch_trigger_reruns_only_the_bound_task() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    let step = core.step(file_watch("styles"));
    assert_eq!(dispatched(&step), ["styles"]);

    let step = core.step(completed("styles"));
    assert!(dispatched(&step).is_empty(), "dependents must not be pulled in");
    assert!(step.keep_running, "services are still up");
    assert!(core.is_idle());
    Ok(())
}

#[test]
fn failed_watch_rerun_is_not_recorded_in_summary() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    core.step(file_watch("scripts"));
    let step = core.step(failed("scripts"));
    assert!(step.keep_running);

    assert!(core.summary().is_success());
    assert!(core.summary().skipped.is_empty());
    Ok(())
}

#[test]
fn retrigger_of_running_task_is_queued_until_it_finishes() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    assert_eq!(dispatched(&core.step(file_watch("styles"))), ["styles"]);

    let step = core.step(file_watch("styles"));
    assert!(dispatched(&step).is_empty());
    assert!(!core.queue_is_empty());

    let step = core.step(completed("styles"));
    assert_eq!(dispatched(&step), ["styles"], "queued trigger starts a new run");
    assert!(core.queue_is_empty());

    let step = core.step(completed("styles"));
    assert!(dispatched(&step).is_empty());
    assert!(core.is_idle());
    Ok(())
}

#[test]
fn bursts_collapse_into_one_queued_rerun() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    core.step(file_watch("styles"));
    for _ in 0..5 {
        core.step(file_watch("styles"));
    }

    assert_eq!(dispatched(&core.step(completed("styles"))), ["styles"]);
    assert!(dispatched(&core.step(completed("styles"))).is_empty());
    assert!(core.is_idle());
    Ok(())
}

#[test]
fn unrelated_trigger_joins_the_active_run() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    assert_eq!(dispatched(&core.step(file_watch("styles"))), ["styles"]);
    assert_eq!(dispatched(&core.step(file_watch("scripts"))), ["scripts"]);
    assert!(core.queue_is_empty());

    core.step(completed("scripts"));
    assert!(!core.is_idle());
    core.step(completed("styles"));
    assert!(core.is_idle());
    Ok(())
}

#[test]
fn cancel_mode_keeps_only_the_latest_queued_trigger() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Cancel)?;
    bring_up_default(&mut core);

    core.step(file_watch("styles"));
    core.step(file_watch("scripts"));
    // Both are now part of the run; further triggers are queued.
    core.step(file_watch("styles"));
    core.step(file_watch("scripts"));

    core.step(completed("styles"));
    let step = core.step(completed("scripts"));
    assert_eq!(dispatched(&step), ["scripts"]);
    Ok(())
}

#[test]
fn shutdown_request_stops_the_core() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(requests_shutdown(&step));
    assert!(!step.keep_running);
    Ok(())
}

#[test]
fn service_that_dies_after_ready_is_a_failure() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    let step = core.step(failed("serve"));
    assert!(step.keep_running, "the watcher is still up");
    assert_eq!(core.summary().failed, [("serve".to_string(), "boom".to_string())]);

    let step = core.step(completed("watch"));
    assert!(requests_shutdown(&step));
    assert!(!step.keep_running);
    Ok(())
}

#[test]
fn stale_completion_is_ignored() -> TestResult {
    let mut core = core_for("build", TriggerWhileRunningBehaviour::Queue)?;

    core.step(manual("clean_dist"));
    let step = core.step(completed("copy_dist"));
    assert!(dispatched(&step).is_empty());
    assert!(step.keep_running);
    assert!(core.summary().succeeded.is_empty());
    Ok(())
}

#[test]
fn failed_watch_rerun_leaves_sibling_reruns_alone() -> TestResult {
    let mut core = core_for("default", TriggerWhileRunningBehaviour::Queue)?;
    bring_up_default(&mut core);

    // One image change fires both conversions; webp_images sits downstream
    // of avif_images in the default pipeline.
    assert_eq!(dispatched(&core.step(file_watch("avif_images"))), ["avif_images"]);
    assert_eq!(dispatched(&core.step(file_watch("webp_images"))), ["webp_images"]);

    let step = core.step(failed("avif_images"));
    assert!(dispatched(&step).is_empty());
    assert!(!core.is_idle(), "webp_images is still running");

    let step = core.step(completed("webp_images"));
    assert!(step.keep_running);
    assert!(core.is_idle());

    // The next change re-runs webp_images normally.
    assert_eq!(dispatched(&core.step(file_watch("webp_images"))), ["webp_images"]);
    assert!(core.summary().is_success());
    Ok(())
}

fn watch_only_core() -> Result<CoreRuntime, Box<dyn Error>> {
    let pipeline = pipeline::resolve_target("watch")?;
    let compiled = compile("watch", &pipeline)?.with_watch_targets(["styles", "scripts", "styles"])?;
    Ok(CoreRuntime::new(
        Scheduler::from_pipeline(&compiled),
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions::default(),
    ))
}

#[test]
fn watcher_on_its_own_reruns_bound_tasks() -> TestResult {
    let mut core = watch_only_core()?;

    assert_eq!(dispatched(&core.step(manual("watch"))), ["watch"]);
    let step = core.step(progressed("watch"));
    assert!(dispatched(&step).is_empty(), "bound tasks wait for a change");
    assert!(step.keep_running);
    assert!(core.is_idle());

    assert_eq!(dispatched(&core.step(file_watch("styles"))), ["styles"]);
    let step = core.step(completed("styles"));
    assert!(step.keep_running, "the watcher is still up");
    assert!(core.is_idle());

    assert_eq!(core.summary().succeeded, ["watch"]);
    Ok(())
}

#[test]
fn watch_targets_are_not_pipeline_roots() -> TestResult {
    let pipeline = pipeline::resolve_target("watch")?;
    let compiled = compile("watch", &pipeline)?.with_watch_targets(["styles", "scripts"])?;

    assert_eq!(compiled.roots(), ["watch"]);
    assert_eq!(compiled.watch_only(), ["styles", "scripts"]);
    assert!(compiled.dependencies_of("styles").is_empty());

    // Pipelines without the watcher are left alone.
    let build = compile("build", &pipeline::resolve_target("build")?)?.with_watch_targets(["styles"])?;
    assert!(build.watch_only().is_empty());
    assert_eq!(build.order(), ["clean_dist", "copy_dist"]);
    Ok(())
}
