// src/watch/hash.rs

//! Content hashes for `use_hash` bindings.
//!
//! A binding's hash is the blake3 digest of the per-file digests of every
//! file it matches, in path order. The last hash seen per binding id lives
//! in a [`HashStore`].

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::fs::FileSystem;

/// Hash table location, relative to the project root.
pub const HASH_FILE_PATH: &str = ".sitepipe/hashes.json";

/// blake3 digest of one file, hex encoded.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening {:?} for hashing", path))?;
    let mut hasher = Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf)? {
            0 => break,
            n => {
                hasher.update(&buf[..n]);
            }
        }
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Combine per-file digests. `hashes` must be in file path order.
pub fn compute_aggregate_hash(hashes: &[String]) -> String {
    hashes
        .iter()
        .fold(Hasher::new(), |mut hasher, h| {
            hasher.update(h.as_bytes());
            hasher
        })
        .finalize()
        .to_hex()
        .to_string()
}

/// Last known hash per binding id.
pub trait HashStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, hash: &str) -> Result<()>;
    /// Forget every key not listed in `active`.
    fn prune(&mut self, active: &[&str]) -> Result<()>;
}

/// Hashes kept for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
    map: BTreeMap<String, String>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashStore for MemoryHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        self.map.insert(key.to_string(), hash.to_string());
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        self.map.retain(|k, _| active.contains(&k.as_str()));
        Ok(())
    }
}

/// Hashes persisted as a JSON object in `<root>/.sitepipe/hashes.json`, so
/// that a restarted watcher does not re-run unchanged bindings.
///
/// The table is read once on construction and written through on change.
#[derive(Debug)]
pub struct FileHashStore {
    path: PathBuf,
    map: BTreeMap<String, String>,
}

impl FileHashStore {
    /// Open the store under `root`. A missing or unreadable table starts
    /// empty.
    pub fn new(root: PathBuf) -> Self {
        let path = root.join(HASH_FILE_PATH);
        let map = match read_table(&path) {
            Ok(map) => map,
            Err(err) => {
                info!(path = ?path, error = %err, "starting with an empty hash table");
                BTreeMap::new()
            }
        };
        Self { path, map }
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating hash directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.map)?;
        fs::write(&self.path, json).with_context(|| format!("writing {:?}", self.path))
    }
}

impl HashStore for FileHashStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &str, hash: &str) -> Result<()> {
        self.map.insert(key.to_string(), hash.to_string());
        self.flush()?;
        debug!(binding = %key, "stored binding hash");
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        let before = self.map.len();
        self.map.retain(|k, _| active.contains(&k.as_str()));
        if self.map.len() < before {
            info!(removed = before - self.map.len(), "pruned stale binding hashes");
            self.flush()?;
        }
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn aggregate_depends_on_order() {
        let a = "a".to_string();
        let b = "b".to_string();
        assert_eq!(
            compute_aggregate_hash(&[a.clone(), b.clone()]),
            compute_aggregate_hash(&[a.clone(), b.clone()])
        );
        assert_ne!(compute_aggregate_hash(&[a.clone(), b.clone()]), compute_aggregate_hash(&[b, a]));
    }

    #[test]
    fn file_hash_tracks_content() -> Result<()> {
        let fs = MockFileSystem::new();
        fs.add_file("src/a.scss", ".a{}");
        let first = compute_file_hash(&fs, Path::new("src/a.scss"))?;
        fs.add_file("src/a.scss", ".a{color:red}");
        assert_ne!(compute_file_hash(&fs, Path::new("src/a.scss"))?, first);
        Ok(())
    }

    #[test]
    fn file_store_survives_reopen_and_prunes() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let mut store = FileHashStore::new(dir.path().to_path_buf());
        store.save("0:styles", "aaa")?;
        store.save("1:scripts", "bbb")?;

        let mut reopened = FileHashStore::new(dir.path().to_path_buf());
        assert_eq!(reopened.load("0:styles")?.as_deref(), Some("aaa"));

        reopened.prune(&["1:scripts"])?;
        let after_prune = FileHashStore::new(dir.path().to_path_buf());
        assert_eq!(after_prune.load("0:styles")?, None);
        assert_eq!(after_prune.load("1:scripts")?.as_deref(), Some("bbb"));
        Ok(())
    }

    #[test]
    fn corrupt_table_starts_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(HASH_FILE_PATH);
        fs::create_dir_all(path.parent().expect("hash file has a parent"))?;
        fs::write(&path, "not json")?;

        let store = FileHashStore::new(dir.path().to_path_buf());
        assert_eq!(store.load("0:styles")?, None);
        Ok(())
    }
}
