// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling the `[[watch.binding]]` table into glob sets.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - (Optionally) content hashing, so a binding only fires when the files it
//!   matches actually changed.
//!
//! It does **not** know about pipelines; it only turns filesystem changes
//! into isolated task triggers and reload signals.

pub mod bindings;
pub mod cache;
pub mod event_handler;
pub mod hash;
pub mod path_utils;
pub mod watcher;

pub use bindings::{build_bindings, collect_matching_files, BindingAction, WatchBinding};
pub use event_handler::{process_file_change, WatchContext};
pub use hash::{FileHashStore, HashStore, MemoryHashStore, HASH_FILE_PATH};
pub use watcher::{spawn_watcher, WatcherHandle};
