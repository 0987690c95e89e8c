// src/tasks/scripts.rs

use tracing::debug;

use crate::tasks::{BuildContext, TaskError, TaskReport};

/// `scripts`: concatenate the configured entries in order and minify the
/// result into a single bundle.
pub fn bundle_scripts(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let scripts = &ctx.config.scripts;

    let mut bundle = String::new();
    for entry in &scripts.entries {
        let path = ctx.resolve(entry);
        if !ctx.fs.is_file(&path) {
            return Err(TaskError::MissingInput(path));
        }
        let source = ctx
            .fs
            .read_to_string(&path)
            .map_err(|e| TaskError::transform(&path, e))?;
        debug!(entry = %entry, bytes = source.len(), "adding script to bundle");

        bundle.push_str(&source);
        // Guard against files without a trailing newline or semicolon.
        if !bundle.ends_with('\n') {
            bundle.push('\n');
        }
        bundle.push_str(";\n");
    }

    let minified = minifier::js::minify(&bundle).to_string();

    let out = ctx.app_path(&scripts.output);
    ctx.fs
        .write(&out, minified.as_bytes())
        .map_err(|e| TaskError::transform(&out, e))?;

    Ok(TaskReport::written(1))
}
