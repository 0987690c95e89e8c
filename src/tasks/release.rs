// src/tasks/release.rs

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::tasks::paths::{ensure_parent, relative_to, SourceSet};
use crate::tasks::{BuildContext, TaskError, TaskReport};

/// `clean_dist`: remove the release directory. A missing directory is fine.
pub fn clean_dist(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let dist = ctx.dist_dir();
    match std::fs::remove_dir_all(&dist) {
        Ok(()) => {
            debug!(dir = ?dist, "removed release directory");
            Ok(TaskReport::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TaskReport::default()),
        Err(e) => Err(TaskError::io(&dist)(e)),
    }
}

/// `copy_dist`: copy every file matching `[release].include` (relative to
/// the app directory) into the release directory, preserving paths.
pub fn copy_dist(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let app = ctx.app_dir();
    let dist = ctx.dist_dir();

    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    for pattern in &ctx.config.release.include {
        let matched = SourceSet::new(pattern)?.collect(ctx.fs.as_ref(), &app)?;
        if matched.is_empty() {
            debug!(pattern = %pattern, "release pattern matched nothing");
        }
        files.extend(matched);
    }

    for source in &files {
        let target = dist.join(relative_to(&app, source));
        ensure_parent(&target)?;
        std::fs::copy(source, &target).map_err(TaskError::io(source))?;
    }

    Ok(TaskReport::written(files.len()))
}

/// `zip_dist`: archive the release directory.
///
/// Entries are stored relative to the release directory with forward
/// slashes, in sorted order, so identical trees give identical listings.
pub fn zip_dist(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let dist = ctx.dist_dir();
    if !dist.is_dir() {
        return Err(TaskError::MissingInput(dist));
    }
    let archive = ctx.archive_path();
    ensure_parent(&archive)?;

    let file = File::create(&archive).map_err(TaskError::io(&archive))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut count = 0;
    for entry in WalkDir::new(&dist).sort_by_file_name() {
        let entry = entry.map_err(|e| TaskError::transform(&dist, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = relative_to(&dist, entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let bytes = std::fs::read(entry.path()).map_err(TaskError::io(entry.path()))?;

        zip.start_file(name, options)
            .map_err(|e| TaskError::transform(&archive, e))?;
        zip.write_all(&bytes).map_err(TaskError::io(&archive))?;
        count += 1;
    }

    let mut inner = zip
        .finish()
        .map_err(|e| TaskError::transform(&archive, e))?;
    inner.flush().map_err(TaskError::io(&archive))?;

    info!(archive = ?archive, files = count, "wrote release archive");
    Ok(TaskReport::written(1))
}
