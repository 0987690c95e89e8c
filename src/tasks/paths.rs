// src/tasks/paths.rs

//! Source selection and output path helpers shared by the transforms.

use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};

use crate::fs::{collect_files, FileSystem};
use crate::tasks::TaskError;

/// Compile a glob with `*` not crossing directory separators, so `*.html`
/// only matches top-level pages while `**` still recurses.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, TaskError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| TaskError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Longest leading run of path components without glob metacharacters.
///
/// `src/images/**/*.png` → `src/images`; `*.html` → ``.
pub fn literal_base(pattern: &str) -> &str {
    let meta = pattern
        .find(|c| matches!(c, '*' | '?' | '[' | '{'))
        .unwrap_or(pattern.len());
    pattern[..meta].rfind('/').map_or("", |idx| &pattern[..idx])
}

/// A glob over files below some directory.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pattern: String,
    matcher: GlobMatcher,
}

impl SourceSet {
    pub fn new(pattern: &str) -> Result<Self, TaskError> {
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: compile_glob(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// All files under `dir` whose `dir`-relative path matches, sorted.
    ///
    /// Only the literal prefix of the pattern is walked, so a pattern like
    /// `src/fonts/**/*.ttf` never descends into unrelated trees.
    pub fn collect(&self, fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>, TaskError> {
        let base = literal_base(&self.pattern);
        let walk_root = if base.is_empty() {
            dir.to_path_buf()
        } else {
            dir.join(base)
        };

        collect_files(fs, &walk_root, |rel| {
            let full = if base.is_empty() {
                rel.to_string()
            } else {
                format!("{base}/{rel}")
            };
            self.matcher.is_match(full)
        })
        .map_err(|err| TaskError::Io {
            path: walk_root.clone(),
            source: into_io_error(err),
        })
    }
}

/// Wrap a walk error, keeping its context chain and the kind of the
/// underlying I/O error.
fn into_io_error(err: anyhow::Error) -> io::Error {
    let kind = err
        .downcast_ref::<io::Error>()
        .map_or(io::ErrorKind::Other, io::Error::kind);
    io::Error::new(kind, err)
}

/// `path` relative to `base`, falling back to the file name.
pub fn relative_to(base: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(base) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.file_name().map(PathBuf::from).unwrap_or_default(),
    }
}

/// Lexically resolve `.` and `..` components without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Output path mirroring `source`'s position under `src_base` inside
/// `out_dir`, optionally with a new extension.
pub fn mirror_path(src_base: &Path, source: &Path, out_dir: &Path, ext: Option<&str>) -> PathBuf {
    let rel = relative_to(src_base, source);
    let mut out = out_dir.join(rel);
    if let Some(ext) = ext {
        out.set_extension(ext);
    }
    out
}

/// True when `output` exists and is at least as new as `source`.
///
/// Missing metadata on either side counts as stale, so the transform runs.
pub fn is_up_to_date(source: &Path, output: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(out)) => out >= src,
        _ => false,
    }
}

/// Create the parent directory of `path`.
pub fn ensure_parent(path: &Path) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    Ok(())
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    ensure_parent(path)?;
    std::fs::write(path, bytes).map_err(TaskError::io(path))
}
