// src/watch/event_handler.rs

//! Turning one changed path into task triggers and reload signals.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::fs::FileSystem;
use crate::server::ReloadHub;
use crate::types::ReloadKind;
use crate::watch::bindings::{collect_matching_files, BindingAction, WatchBinding};
use crate::watch::cache::FileCache;
use crate::watch::hash::{compute_aggregate_hash, HashStore};
use crate::watch::path_utils::relative_str;

/// Everything the watcher's event loop needs, shared across events.
#[derive(Clone)]
pub struct WatchContext {
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub bindings: Arc<Vec<WatchBinding>>,
    pub runtime_tx: mpsc::Sender<RuntimeEvent>,
    pub reload: ReloadHub,
    pub hash_store: Arc<Mutex<Box<dyn HashStore>>>,
    pub file_cache: Arc<Mutex<FileCache>>,
}

/// Process a single changed path.
///
/// Every binding matching the path fires once, in table order:
/// `RunTask` bindings send an isolated trigger to the runtime, `Reload`
/// bindings broadcast a full reload. Hash-gated bindings are skipped when
/// their matched content is unchanged.
///
/// Returns `false` once the runtime channel is closed.
pub async fn process_file_change(ctx: &WatchContext, path: &Path) -> bool {
    let Some(rel_str) = relative_str(&ctx.root, path) else {
        warn!(
            "could not relativize path {:?} against root {:?}",
            path, ctx.root
        );
        return true;
    };

    debug!(?path, rel = %rel_str, "normalized event path");

    let matching: Vec<&WatchBinding> = ctx
        .bindings
        .iter()
        .filter(|b| b.matches(&rel_str))
        .collect();

    for binding in matching {
        if !should_fire(ctx, path, &rel_str, binding).await {
            continue;
        }

        match binding.action() {
            BindingAction::RunTask(task) => {
                info!(task = %task, path = %rel_str, "change detected; re-running task");
                if let Err(err) = ctx
                    .runtime_tx
                    .send(RuntimeEvent::TaskTriggered {
                        task: task.clone(),
                        reason: TriggerReason::FileWatch,
                    })
                    .await
                {
                    warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
                    return false;
                }
            }
            BindingAction::Reload => {
                info!(path = %rel_str, "change detected; reloading browsers");
                ctx.reload.send(ReloadKind::Full, rel_str.clone());
            }
        }
    }

    true
}

/// Check whether a hash-gated binding should fire.
///
/// Returns true when the binding does not use hashing, when the aggregate
/// hash of its matched files changed, or when hashing fails.
async fn should_fire(
    ctx: &WatchContext,
    abs_path: &Path,
    rel_path: &str,
    binding: &WatchBinding,
) -> bool {
    if !binding.use_hash() {
        return true;
    }

    let ctx = ctx.clone();
    let abs_path = abs_path.to_path_buf();
    let rel_path = rel_path.to_string();
    let binding = binding.clone();

    tokio::task::spawn_blocking(move || {
        let id = binding.id();

        let files = match collect_matching_files(ctx.fs.as_ref(), &ctx.root, &binding) {
            Ok(files) => files,
            Err(err) => {
                warn!(binding = %id, error = %err, "failed to collect watched files; firing anyway");
                return true;
            }
        };

        let mut file_hashes = Vec::with_capacity(files.len());
        {
            let Ok(mut cache) = ctx.file_cache.lock() else {
                warn!("file cache mutex poisoned; firing anyway");
                return true;
            };
            cache.invalidate(&abs_path);

            for file_path in files {
                match cache.get_or_compute(ctx.fs.as_ref(), &file_path) {
                    Ok(h) => file_hashes.push(h),
                    Err(err) => {
                        warn!(
                            binding = %id,
                            file = ?file_path,
                            error = %err,
                            "failed to compute file hash; firing anyway"
                        );
                        return true;
                    }
                }
            }
        }

        let new_hash = compute_aggregate_hash(&file_hashes);

        let Ok(mut store) = ctx.hash_store.lock() else {
            warn!(binding = %id, "hash store mutex poisoned; firing anyway");
            return true;
        };

        match store.load(id) {
            Ok(Some(old_hash)) if old_hash == new_hash => {
                info!(
                    binding = %id,
                    path = %rel_path,
                    "watched content unchanged; skipping"
                );
                false
            }
            Ok(_) => {
                if let Err(err) = store.save(id, &new_hash) {
                    warn!(binding = %id, error = %err, "failed to save binding hash");
                }
                true
            }
            Err(err) => {
                warn!(binding = %id, error = %err, "failed to load binding hash; firing anyway");
                true
            }
        }
    })
    .await
    .unwrap_or(true)
}
