// src/watch/path_utils.rs

use std::path::{Path, PathBuf};

/// `path` relative to `root` with forward slashes, as binding globs expect.
///
/// Event paths may use a different absolute prefix than `root` (symlinked
/// temp dirs on macOS), so on a prefix mismatch the path is canonicalized.
/// A removed file can no longer be canonicalized; its parent directory is
/// used instead.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => canonical(path)?.strip_prefix(root).ok()?.to_path_buf(),
    };
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn canonical(path: &Path) -> Option<PathBuf> {
    if let Ok(canon) = path.canonicalize() {
        return Some(canon);
    }
    let parent = path.parent()?.canonicalize().ok()?;
    Some(parent.join(path.file_name()?))
}
