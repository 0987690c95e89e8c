// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// File name looked up in the working directory when `--config` is omitted.
pub const DEFAULT_CONFIG_FILE: &str = "Sitepipe.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the configuration for a CLI invocation.
///
/// - An explicit path must exist.
/// - Without one, `Sitepipe.toml` is used when present; otherwise the
///   built-in defaults apply.
///
/// Returns the config together with the path it was read from, if any.
pub fn resolve(explicit: Option<&str>) -> Result<(ConfigFile, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let path = PathBuf::from(path);
        let cfg = load_and_validate(&path)?;
        return Ok((cfg, Some(path)));
    }

    let path = default_config_path();
    if path.is_file() {
        let cfg = load_and_validate(&path)?;
        return Ok((cfg, Some(path)));
    }

    info!("no {DEFAULT_CONFIG_FILE} found; using built-in defaults");
    let cfg = ConfigFile::try_from(RawConfigFile::default())?;
    Ok((cfg, None))
}

/// Helper to resolve a default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_FILE)
}
