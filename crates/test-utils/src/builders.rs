use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use sitepipe::config::{ConfigFile, RawConfigFile, WatchBindingConfig};
use sitepipe::tasks::BuildContext;
use sitepipe::types::{HashStorageMode, TriggerWhileRunningBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults; the `with_*` methods tweak a section.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Edit the raw config directly for anything without a helper.
    pub fn edit(mut self, f: impl FnOnce(&mut RawConfigFile)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn without_bindings(mut self) -> Self {
        self.config.watch.bindings.clear();
        self
    }

    pub fn with_binding(mut self, binding: WatchBindingConfig) -> Self {
        self.config.watch.bindings.push(binding);
        self
    }

    pub fn with_default_use_hash(mut self, val: bool) -> Self {
        self.config.watch.use_hash = val;
        self
    }

    pub fn with_hash_storage(mut self, mode: HashStorageMode) -> Self {
        self.config.watch.hash_storage_mode = mode;
        self
    }

    pub fn with_queue(mut self, behaviour: TriggerWhileRunningBehaviour, length: usize) -> Self {
        self.config.watch.triggered_while_running_behaviour = behaviour;
        self.config.watch.queue_length = length;
        self
    }

    pub fn with_release_include(mut self, patterns: &[&str]) -> Self {
        self.config.release.include = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway project directory with a `BuildContext` pointing at it.
pub struct TestProject {
    dir: TempDir,
    ctx: BuildContext,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_config(ConfigFileBuilder::new().build())
    }

    pub fn with_config(config: ConfigFile) -> Self {
        let dir = tempfile::tempdir().expect("creating temp project dir");
        let ctx = BuildContext::new(dir.path().to_path_buf(), Arc::new(config));
        Self { dir, ctx }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn ctx(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a project file, creating parent directories.
    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("creating parent dirs");
        }
        std::fs::write(&path, contents).expect("writing project file");
        path
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.path(rel)).expect("reading project file")
    }

    pub fn read_string(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("reading project file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    /// Every file below `rel`, as sorted `rel`-relative forward-slash paths.
    pub fn files_under(&self, rel: &str) -> Vec<String> {
        let base = self.path(rel);
        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&base) {
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        out.sort();
        out
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
