// src/tasks/html.rs

//! HTML page assembly and minification.
//!
//! Pages are assembled from partials with include directives:
//!
//! ```html
//! @include('partials/header.html', {"title": "Home"})
//! ```
//!
//! Paths resolve relative to the file containing the directive. Inside an
//! included file, `@title` is replaced by the matching context value; unknown
//! placeholders are left untouched so stray `@` text survives.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::fs::FileSystem;
use crate::tasks::paths::{normalize, SourceSet};
use crate::tasks::{BuildContext, TaskError, TaskReport};

/// Nesting limit for includes; exceeding it almost always means a cycle.
pub const MAX_INCLUDE_DEPTH: usize = 32;

/// Expands include directives and context placeholders.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    directive: String,
    placeholder: Regex,
}

impl IncludeResolver {
    pub fn new(prefix: &str) -> Result<Self, TaskError> {
        let pattern = format!(
            r"{}([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)",
            regex::escape(prefix)
        );
        let placeholder = Regex::new(&pattern).map_err(|e| TaskError::Pattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            directive: format!("{prefix}include("),
            placeholder,
        })
    }

    /// Read `path` and expand it with an empty context.
    pub fn render_file(&self, fs: &dyn FileSystem, path: &Path) -> Result<String, TaskError> {
        self.render(fs, path, &Map::new(), 0)
    }

    fn render(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        context: &Map<String, Value>,
        depth: usize,
    ) -> Result<String, TaskError> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(TaskError::transform(
                path,
                format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels (cyclic include?)"),
            ));
        }
        if !fs.is_file(path) {
            return Err(TaskError::MissingInput(path.to_path_buf()));
        }
        let source = fs
            .read_to_string(path)
            .map_err(|e| TaskError::transform(path, e))?;

        let text = self.substitute(&source, context);
        let base_dir = path.parent().unwrap_or(Path::new(""));

        let mut out = String::with_capacity(text.len());
        let mut rest = text.as_str();

        while let Some(start) = rest.find(&self.directive) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.directive.len()..];
            let (include, consumed) =
                parse_arguments(after).map_err(|msg| TaskError::transform(path, msg))?;

            let mut child_context = context.clone();
            child_context.extend(include.context);

            let target = normalize(&base_dir.join(&include.path));
            debug!(from = ?path, include = ?target, depth, "expanding include");
            out.push_str(&self.render(fs, &target, &child_context, depth + 1)?);

            rest = &after[consumed..];
        }
        out.push_str(rest);

        Ok(out)
    }

    fn substitute(&self, text: &str, context: &Map<String, Value>) -> String {
        if context.is_empty() {
            return text.to_string();
        }
        self.placeholder
            .replace_all(text, |caps: &regex::Captures<'_>| {
                match lookup(context, &caps[1]) {
                    Some(value) => value_to_text(value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

struct IncludeArgs {
    path: String,
    context: Map<String, Value>,
}

/// Parse `'path'[, {json}])` and return the arguments plus bytes consumed
/// (including the closing parenthesis).
fn parse_arguments(input: &str) -> Result<(IncludeArgs, usize), String> {
    let mut pos = skip_ws(input, 0);

    let quote = input[pos..]
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| "include path must be a quoted string".to_string())?;
    pos += 1;
    let end = input[pos..]
        .find(quote)
        .ok_or_else(|| "unterminated include path".to_string())?;
    let path = input[pos..pos + end].to_string();
    pos = skip_ws(input, pos + end + 1);

    let mut context = Map::new();
    if input[pos..].starts_with(',') {
        pos = skip_ws(input, pos + 1);
        let len = json_object_len(&input[pos..])
            .ok_or_else(|| format!("unterminated context object for include '{path}'"))?;
        let value: Value = serde_json::from_str(&input[pos..pos + len])
            .map_err(|e| format!("invalid context for include '{path}': {e}"))?;
        match value {
            Value::Object(map) => context = map,
            _ => return Err(format!("context for include '{path}' must be an object")),
        }
        pos = skip_ws(input, pos + len);
    }

    if !input[pos..].starts_with(')') {
        return Err(format!("expected ')' after include '{path}'"));
    }

    Ok((IncludeArgs { path, context }, pos + 1))
}

fn skip_ws(input: &str, from: usize) -> usize {
    let trimmed = input[from..].trim_start();
    input.len() - trimmed.len()
}

/// Byte length of the JSON object at the start of `input`, honouring
/// nested braces and string literals.
fn json_object_len(input: &str) -> Option<usize> {
    if !input.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn lookup<'a>(context: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `html_include`: assemble every page into the app directory.
pub fn include_pages(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let html = &ctx.config.html;
    let resolver = IncludeResolver::new(&html.include_prefix)?;
    let pages = SourceSet::new(&html.pages)?.collect(ctx.fs.as_ref(), &ctx.root)?;
    let app = ctx.app_dir();

    let mut report = TaskReport::default();
    for page in pages {
        let rendered = resolver.render_file(ctx.fs.as_ref(), &page)?;
        let out = output_page_path(&app, &page);
        ctx.fs
            .write(&out, rendered.as_bytes())
            .map_err(|e| TaskError::transform(&out, e))?;
        report.written += 1;
    }
    Ok(report)
}

fn output_page_path(app: &Path, page: &Path) -> PathBuf {
    app.join(page.file_name().unwrap_or_default())
}

/// `html_minify`: collapse whitespace in the assembled pages, in place.
pub fn minify_pages(ctx: &BuildContext) -> Result<TaskReport, TaskError> {
    let app = ctx.app_dir();
    let pages = SourceSet::new(&ctx.config.html.minify)?.collect(ctx.fs.as_ref(), &app)?;

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.do_not_minify_doctype = true;

    let mut report = TaskReport::default();
    for page in pages {
        let source = ctx
            .fs
            .read_to_string(&page)
            .map_err(|e| TaskError::transform(&page, e))?;
        let minified = minify_html::minify(source.as_bytes(), &cfg);
        ctx.fs
            .write(&page, &minified)
            .map_err(|e| TaskError::transform(&page, e))?;
        report.written += 1;
    }
    Ok(report)
}
