// tests/runtime_fake_executor.rs

use std::error::Error;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use sitepipe::dag::Scheduler;
use sitepipe::engine::{
    CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use sitepipe::pipeline::{self, compile, Pipeline};
use sitepipe_test_utils::fake_executor::FakeExecutor;
use sitepipe_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    rt_tx: mpsc::Sender<RuntimeEvent>,
    runtime: Runtime<FakeExecutor>,
    executed: Arc<Mutex<Vec<String>>>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

/// Compile `pipeline`, seed its roots as manual triggers and wire a fake
/// executor that fails the tasks in `failing`.
async fn harness(pipeline: Pipeline, failing: &[&str]) -> Result<Harness, Box<dyn Error>> {
    let compiled = compile("test", &pipeline)?;
    let scheduler = Scheduler::from_pipeline(&compiled);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let mut executor = FakeExecutor::new(rt_tx.clone(), executed.clone());
    for task in failing {
        executor = executor.failing(task);
    }
    let shutdown = executor.shutdown_flag();

    for task in compiled.roots() {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::Manual,
            })
            .await?;
    }

    let core = CoreRuntime::new(
        scheduler,
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions::default(),
    );
    let runtime = Runtime::new(core, rt_rx, executor);

    Ok(Harness {
        rt_tx,
        runtime,
        executed,
        shutdown,
    })
}

async fn run_to_end(runtime: Runtime<FakeExecutor>) -> Result<RunSummary, Box<dyn Error>> {
    match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(result) => Ok(result?),
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    }
}

#[tokio::test]
async fn build_pipeline_runs_clean_then_copy() -> TestResult {
    init_tracing();

    let pipeline = pipeline::builtin("build").ok_or("missing build pipeline")?;
    let h = harness(pipeline, &[]).await?;
    let summary = run_to_end(h.runtime).await?;

    assert_eq!(*h.executed.lock().unwrap(), ["clean_dist", "copy_dist"]);
    assert!(summary.is_success());
    assert_eq!(summary.succeeded, ["clean_dist", "copy_dist"]);
    assert!(h.shutdown.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn failure_in_series_skips_the_rest() -> TestResult {
    init_tracing();

    let pipeline = pipeline::builtin("release").ok_or("missing release pipeline")?;
    let h = harness(pipeline, &["clean_dist"]).await?;
    let summary = run_to_end(h.runtime).await?;

    assert_eq!(*h.executed.lock().unwrap(), ["clean_dist"]);
    assert!(!summary.is_success());
    assert_eq!(
        summary.failed,
        [("clean_dist".to_string(), "clean_dist failed".to_string())]
    );

    let mut skipped = summary.skipped.clone();
    skipped.sort();
    assert_eq!(skipped, ["copy_dist", "zip_dist"]);
    Ok(())
}

#[tokio::test]
async fn failing_parallel_sibling_does_not_stop_the_other() -> TestResult {
    init_tracing();

    let t = Pipeline::task;
    let pipeline = Pipeline::series([
        Pipeline::parallel([t("styles"), Pipeline::series([t("scripts"), t("images")])]),
        t("copy_dist"),
    ]);
    let h = harness(pipeline, &["styles"]).await?;
    let summary = run_to_end(h.runtime).await?;

    let executed = h.executed.lock().unwrap().clone();
    assert!(executed.contains(&"scripts".to_string()));
    assert!(executed.contains(&"images".to_string()));
    assert!(!executed.contains(&"copy_dist".to_string()));

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "styles");
    assert!(summary.succeeded.contains(&"scripts".to_string()));
    assert!(summary.succeeded.contains(&"images".to_string()));
    assert_eq!(summary.skipped, ["copy_dist"]);
    Ok(())
}

#[tokio::test]
async fn services_keep_the_runtime_alive_until_shutdown() -> TestResult {
    init_tracing();

    let t = Pipeline::task;
    let pipeline = Pipeline::series([t("styles"), Pipeline::parallel([t("serve"), t("watch")])]);
    let h = harness(pipeline, &[]).await?;

    let executed = h.executed.clone();
    let shutdown = h.shutdown.clone();
    let handle = tokio::spawn(h.runtime.run());

    // Wait until both services have been dispatched and reported ready.
    timeout(Duration::from_secs(3), async {
        loop {
            if executed.lock().unwrap().len() == 3 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;

    sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "runtime exited while services were up");
    assert!(!shutdown.load(Ordering::SeqCst));

    h.rt_tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = timeout(Duration::from_secs(3), handle).await???;

    assert!(shutdown.load(Ordering::SeqCst));
    assert!(summary.is_success());
    let mut succeeded = summary.succeeded.clone();
    succeeded.sort();
    assert_eq!(succeeded, ["serve", "styles", "watch"]);
    Ok(())
}

#[tokio::test]
async fn single_task_target_runs_alone() -> TestResult {
    init_tracing();

    let pipeline = pipeline::resolve_target("favicons")?;
    let h = harness(pipeline, &[]).await?;
    let summary = run_to_end(h.runtime).await?;

    assert_eq!(*h.executed.lock().unwrap(), ["favicons"]);
    assert_eq!(summary.succeeded, ["favicons"]);
    Ok(())
}
