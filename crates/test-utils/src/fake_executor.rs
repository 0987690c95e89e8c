use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use sitepipe::dag::ScheduledTask;
use sitepipe::engine::{RuntimeEvent, TaskOutcome};
use sitepipe::exec::backend::BackendFuture;
use sitepipe::exec::ExecutorBackend;

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - immediately reports `TaskCompleted` for transforms (failing the ones
///   listed in `failing`)
/// - reports `TaskProgressed` for services, which then stay "up"
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    shut_down: Arc<AtomicBool>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: HashSet::new(),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make `task` fail every time it runs.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// Flag set once the runtime asked the executor to shut down.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shut_down)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());

                let event = if t.long_lived {
                    RuntimeEvent::TaskProgressed {
                        task: t.name.clone(),
                    }
                } else if failing.contains(&t.name) {
                    RuntimeEvent::TaskCompleted {
                        task: t.name.clone(),
                        outcome: TaskOutcome::Failed(format!("{} failed", t.name)),
                    }
                } else {
                    RuntimeEvent::TaskCompleted {
                        task: t.name.clone(),
                        outcome: TaskOutcome::Success,
                    }
                };

                tx.send(event).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }

    fn shutdown(&mut self) -> BackendFuture<'_> {
        self.shut_down.store(true, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}
