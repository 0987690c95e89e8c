// src/watch/bindings.rs

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::WatchSection;
use crate::engine::TaskName;
use crate::fs::{collect_files, FileSystem};

/// What happens when a binding matches a changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingAction {
    /// Re-run exactly this leaf task, without its neighbours.
    RunTask(TaskName),
    /// Tell connected browsers to reload the page.
    Reload,
}

/// Compiled watch/exclude glob patterns for a single binding.
///
/// The patterns are relative to the project root. The watcher passes
/// relative paths (e.g. `"src/scss/main.scss"`) into `matches`.
#[derive(Clone)]
pub struct WatchBinding {
    /// Stable key for hash storage: position in the table plus action.
    id: String,
    action: BindingAction,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
    use_hash: bool,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("id", &self.id)
            .field("action", &self.action)
            .field("use_hash", &self.use_hash)
            .finish_non_exhaustive()
    }
}

impl WatchBinding {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action(&self) -> &BindingAction {
        &self.action
    }

    /// Whether this binding only fires when its matched content changed.
    pub fn use_hash(&self) -> bool {
        self.use_hash
    }

    /// Returns true if the binding is interested in `rel_path` (relative to
    /// the project root, forward slashes).
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Compile the `[watch]` binding table, in declaration order.
pub fn build_bindings(section: &WatchSection) -> Result<Vec<WatchBinding>> {
    let mut bindings = Vec::with_capacity(section.bindings.len());

    for (idx, raw) in section.bindings.iter().enumerate() {
        let action = match &raw.run {
            Some(task) => BindingAction::RunTask(task.clone()),
            None => BindingAction::Reload,
        };
        let label = match &action {
            BindingAction::RunTask(task) => task.as_str(),
            BindingAction::Reload => "reload",
        };
        let id = format!("{idx}:{label}");

        let watch_set = build_globset(&raw.watch)
            .with_context(|| format!("building watch globset for binding {id}"))?;

        let exclude_set = if raw.exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(&raw.exclude)
                    .with_context(|| format!("building exclude globset for binding {id}"))?,
            )
        };

        bindings.push(WatchBinding {
            id,
            action,
            watch_set,
            exclude_set,
            use_hash: raw.effective_use_hash(section.use_hash),
        });
    }

    Ok(bindings)
}

/// Build a GlobSet where `*` stays within one path segment.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect all files under `root` that this binding matches.
///
/// Used when computing aggregated hashes for `use_hash` bindings.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    binding: &WatchBinding,
) -> Result<Vec<PathBuf>> {
    collect_files(fs, root, |rel| binding.matches(rel))
}
