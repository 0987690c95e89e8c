// src/pipeline/mod.rs

//! Pipeline composition.
//!
//! A pipeline is a tree of leaf tasks combined with [`Pipeline::Series`]
//! (children run one after another, a failure stops the rest) and
//! [`Pipeline::Parallel`] (children start together and each runs to
//! completion regardless of its siblings).
//!
//! Pipelines are compiled into the dependency graph consumed by the
//! scheduler, see [`compile`].

use std::fmt;

use crate::errors::{Result, SitepipeError};
use crate::tasks;

pub mod compile;

pub use compile::{compile, CompiledPipeline};

/// Names of the built-in pipelines, in display order.
pub const BUILTIN_PIPELINES: [&str; 3] = ["default", "build", "release"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pipeline {
    Task(String),
    Series(Vec<Pipeline>),
    Parallel(Vec<Pipeline>),
}

impl Pipeline {
    pub fn task(name: &str) -> Self {
        Pipeline::Task(name.to_string())
    }

    pub fn series<I: IntoIterator<Item = Pipeline>>(children: I) -> Self {
        Pipeline::Series(children.into_iter().collect())
    }

    pub fn parallel<I: IntoIterator<Item = Pipeline>>(children: I) -> Self {
        Pipeline::Parallel(children.into_iter().collect())
    }

    /// Leaf names in depth-first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pipeline::Task(name) => out.push(name),
            Pipeline::Series(children) | Pipeline::Parallel(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, children) = match self {
            Pipeline::Task(name) => return f.write_str(name),
            Pipeline::Series(children) => ("series", children),
            Pipeline::Parallel(children) => ("parallel", children),
        };
        write!(f, "{label}(")?;
        for (idx, child) in children.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

/// Look up a built-in pipeline.
///
/// - `default`: every development transform in sequence, then the dev
///   server and watcher side by side.
/// - `build`: clean and repopulate the release directory.
/// - `release`: `build` plus the release archive.
pub fn builtin(name: &str) -> Option<Pipeline> {
    let t = Pipeline::task;
    match name {
        "default" => Some(Pipeline::series([
            t("html_include"),
            t("html_minify"),
            t("scripts"),
            t("styles"),
            t("images"),
            t("svg_sprites"),
            t("avif_images"),
            t("webp_images"),
            t("favicons"),
            t("woff"),
            t("woff2"),
            Pipeline::parallel([t("serve"), t("watch")]),
        ])),
        "build" => Some(Pipeline::series([t("clean_dist"), t("copy_dist")])),
        "release" => Some(Pipeline::series([
            t("clean_dist"),
            t("copy_dist"),
            t("zip_dist"),
        ])),
        _ => None,
    }
}

/// Resolve a CLI target: a built-in pipeline name or a single task.
pub fn resolve_target(name: &str) -> Result<Pipeline> {
    if let Some(pipeline) = builtin(name) {
        return Ok(pipeline);
    }
    if tasks::lookup(name).is_some() {
        return Ok(Pipeline::task(name));
    }
    Err(SitepipeError::TaskNotFound(format!(
        "'{name}' is neither a pipeline ({}) nor a task",
        BUILTIN_PIPELINES.join(", ")
    )))
}
