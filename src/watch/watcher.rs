// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::fs::{FileSystem, RealFileSystem};
use crate::server::ReloadHub;
use crate::types::HashStorageMode;
use crate::watch::bindings::WatchBinding;
use crate::watch::cache::FileCache;
use crate::watch::event_handler::{process_file_change, WatchContext};
use crate::watch::hash::{FileHashStore, HashStore, MemoryHashStore};

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops file watching and ends the event loop.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and applies
/// the binding table to every changed path.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - `bindings` is the compiled binding table.
/// - `runtime_tx` receives `TaskTriggered { reason: FileWatch }` events.
/// - `reload` receives full reloads from `Reload` bindings.
/// - `hash_storage_mode` determines where binding hashes are stored.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Vec<WatchBinding>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    reload: ReloadHub,
    hash_storage_mode: HashStorageMode,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("watch event loop gone; dropping notify event");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = ?root, bindings = bindings.len(), "file watcher started");

    let mut hash_store: Box<dyn HashStore> = match hash_storage_mode {
        HashStorageMode::File => Box::new(FileHashStore::new(root.clone())),
        HashStorageMode::Memory => Box::new(MemoryHashStore::new()),
    };

    // Drop hashes left over from an earlier binding table.
    let active: Vec<&str> = bindings.iter().map(|b| b.id()).collect();
    if let Err(e) = hash_store.prune(&active) {
        warn!("failed to prune stale hashes: {}", e);
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let ctx = WatchContext {
        root,
        fs,
        bindings: Arc::new(bindings),
        runtime_tx,
        reload,
        hash_store: Arc::new(Mutex::new(hash_store)),
        file_cache: Arc::new(Mutex::new(FileCache::new())),
    };

    tokio::spawn(async move {
        'events: while let Some(event) = event_rx.recv().await {
            if event.kind.is_access() {
                continue;
            }
            debug!(?event, "received notify event");

            for path in &event.paths {
                if !process_file_change(&ctx, path).await {
                    break 'events;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
