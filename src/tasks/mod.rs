// src/tasks/mod.rs

//! Leaf tasks.
//!
//! Every leaf is either a *transform* (a synchronous function turning input
//! files into output files) or a *service* (the dev server and the watcher,
//! which run until shutdown). The registry in [`TASKS`] is the single source
//! of truth for task names; pipelines and watch bindings refer to entries
//! by name.
//!
//! - [`html`]: partial inclusion and minification.
//! - [`scripts`] / [`styles`]: script bundling and SCSS compilation.
//! - [`images`] / [`sprite`] / [`favicons`]: raster and vector assets.
//! - [`fonts`]: TTF to WOFF / WOFF2.
//! - [`release`]: cleaning, copying and archiving the release output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigFile;
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::ReloadKind;

pub mod favicons;
pub mod fonts;
pub mod html;
pub mod images;
pub mod paths;
pub mod release;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod svg;

/// Failure of a single transform.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to transform {}: {message}", path.display())]
    Transform { path: PathBuf, message: String },

    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> TaskError {
        let path = path.into();
        move |source| TaskError::Io { path, source }
    }

    pub fn transform(path: impl Into<PathBuf>, message: impl ToString) -> TaskError {
        TaskError::Transform {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// What a transform did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// Output files (re)written.
    pub written: usize,
    /// Inputs skipped because their output was already up to date.
    pub skipped: usize,
}

impl TaskReport {
    pub fn written(n: usize) -> Self {
        Self { written: n, skipped: 0 }
    }
}

/// Everything a transform needs: project root, configuration and the
/// filesystem used for text assets.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub root: PathBuf,
    pub config: Arc<ConfigFile>,
    pub fs: Arc<dyn FileSystem>,
}

impl BuildContext {
    pub fn new(root: impl Into<PathBuf>, config: Arc<ConfigFile>) -> Self {
        Self::with_fs(root, config, Arc::new(RealFileSystem))
    }

    pub fn with_fs(
        root: impl Into<PathBuf>,
        config: Arc<ConfigFile>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            root: root.into(),
            config,
            fs,
        }
    }

    /// Resolve a root-relative path.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn app_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.app)
    }

    /// Resolve a path relative to the development output directory.
    pub fn app_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.app_dir().join(rel)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.resolve(&self.config.paths.dist)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.config.paths.archive_dir)
            .join(&self.config.paths.archive_name)
    }
}

pub type TransformFn = fn(&BuildContext) -> Result<TaskReport, TaskError>;

/// Long-lived tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    DevServer,
    Watcher,
}

#[derive(Debug, Clone, Copy)]
pub enum TaskKind {
    Transform(TransformFn),
    Service(ServiceKind),
}

impl TaskKind {
    pub fn is_service(&self) -> bool {
        matches!(self, TaskKind::Service(_))
    }
}

/// Static description of a leaf task.
#[derive(Debug, Clone, Copy)]
pub struct TaskDef {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: TaskKind,
    /// Reload signal sent to browsers after a successful run.
    pub reload: Option<ReloadKind>,
}

pub const TASKS: &[TaskDef] = &[
    TaskDef {
        name: "html_include",
        description: "assemble pages from HTML partials",
        kind: TaskKind::Transform(html::include_pages),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "html_minify",
        description: "collapse whitespace in assembled pages",
        kind: TaskKind::Transform(html::minify_pages),
        reload: None,
    },
    TaskDef {
        name: "scripts",
        description: "concatenate and minify scripts",
        kind: TaskKind::Transform(scripts::bundle_scripts),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "styles",
        description: "compile, prefix and minify SCSS",
        kind: TaskKind::Transform(styles::compile_styles),
        reload: Some(ReloadKind::Styles),
    },
    TaskDef {
        name: "images",
        description: "optimize images in their original format",
        kind: TaskKind::Transform(images::optimize_images),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "svg_sprites",
        description: "build the SVG icon sprite",
        kind: TaskKind::Transform(sprite::build_sprite),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "avif_images",
        description: "convert raster images to AVIF",
        kind: TaskKind::Transform(images::convert_to_avif),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "webp_images",
        description: "convert raster images to WebP",
        kind: TaskKind::Transform(images::convert_to_webp),
        reload: Some(ReloadKind::Full),
    },
    TaskDef {
        name: "favicons",
        description: "generate favicons, manifest and HTML snippet",
        kind: TaskKind::Transform(favicons::generate_favicons),
        reload: None,
    },
    TaskDef {
        name: "woff",
        description: "convert TTF fonts to WOFF",
        kind: TaskKind::Transform(fonts::convert_to_woff),
        reload: None,
    },
    TaskDef {
        name: "woff2",
        description: "convert TTF fonts to WOFF2",
        kind: TaskKind::Transform(fonts::convert_to_woff2),
        reload: None,
    },
    TaskDef {
        name: "clean_dist",
        description: "remove the release directory",
        kind: TaskKind::Transform(release::clean_dist),
        reload: None,
    },
    TaskDef {
        name: "copy_dist",
        description: "copy built artifacts into the release directory",
        kind: TaskKind::Transform(release::copy_dist),
        reload: None,
    },
    TaskDef {
        name: "zip_dist",
        description: "archive the release directory",
        kind: TaskKind::Transform(release::zip_dist),
        reload: None,
    },
    TaskDef {
        name: "serve",
        description: "serve the app directory with live reload",
        kind: TaskKind::Service(ServiceKind::DevServer),
        reload: None,
    },
    TaskDef {
        name: WATCH_TASK,
        description: "re-run tasks when sources change",
        kind: TaskKind::Service(ServiceKind::Watcher),
        reload: None,
    },
];

/// Name of the watcher service.
pub const WATCH_TASK: &str = "watch";

/// Look up a task by name.
pub fn lookup(name: &str) -> Option<&'static TaskDef> {
    TASKS.iter().find(|t| t.name == name)
}
