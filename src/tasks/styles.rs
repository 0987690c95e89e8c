// src/tasks/styles.rs

//! SCSS compilation: `grass` turns the entry stylesheet into CSS, then
//! `lightningcss` adds vendor prefixes for the configured browserslist
//! queries and minifies the result.

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use tracing::debug;

use crate::tasks::{BuildContext, TaskError, TaskReport};

/// `styles`: compile the SCSS entry into the minified stylesheet.
pub fn compile_styles(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let styles = &ctx.config.styles;
    let entry = ctx.resolve(&styles.entry);
    if !entry.is_file() {
        return Err(TaskError::MissingInput(entry));
    }

    let css = compile_scss(&entry)?;
    let targets = browser_targets(&entry, &styles.browsers)?;
    let minified = prefix_and_minify(&entry, &css, targets)?;

    let out = ctx.app_path(&styles.output);
    ctx.fs
        .write(&out, minified.as_bytes())
        .map_err(|e| TaskError::transform(&out, e))?;

    debug!(entry = ?entry, output = ?out, bytes = minified.len(), "compiled stylesheet");
    Ok(TaskReport::written(1))
}

fn compile_scss(entry: &Path) -> Result<String, TaskError> {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);
    grass::from_path(entry, &options).map_err(|e| TaskError::transform(entry, e))
}

fn browser_targets(entry: &Path, queries: &[String]) -> Result<Targets, TaskError> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| TaskError::transform(entry, format!("browserslist: {e}")))?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Run `css` through lightningcss with the given targets.
pub fn prefix_and_minify(source: &Path, css: &str, targets: Targets) -> Result<String, TaskError> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: source.display().to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| TaskError::transform(source, e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| TaskError::transform(source, e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| TaskError::transform(source, e.to_string()))?;

    Ok(printed.code)
}
