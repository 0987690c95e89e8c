// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SitepipeError};
use crate::tasks::{self, TaskKind};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_sources(cfg)?;
    validate_images(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SitepipeError {
    SitepipeError::ConfigError(msg.into())
}

fn validate_sources(cfg: &RawConfigFile) -> Result<()> {
    if cfg.scripts.entries.is_empty() {
        return Err(config_error("[scripts].entries must list at least one file"));
    }
    if cfg.styles.browsers.is_empty() {
        return Err(config_error("[styles].browsers must contain at least one query"));
    }
    if cfg.paths.archive_name.trim().is_empty() {
        return Err(config_error("[paths].archive_name must not be empty"));
    }
    if cfg.html.include_prefix.is_empty() {
        return Err(config_error("[html].include_prefix must not be empty"));
    }

    let globs = [
        ("[html].pages", &cfg.html.pages),
        ("[html].minify", &cfg.html.minify),
        ("[images].sources", &cfg.images.sources),
        ("[images].raster_sources", &cfg.images.raster_sources),
        ("[sprite].icons", &cfg.sprite.icons),
        ("[fonts].sources", &cfg.fonts.sources),
        ("[favicons].sources", &cfg.favicons.sources),
    ];
    for (field, pattern) in globs {
        check_glob(field, pattern)?;
    }
    for pattern in &cfg.release.include {
        check_glob("[release].include", pattern)?;
    }
    Ok(())
}

fn validate_images(cfg: &RawConfigFile) -> Result<()> {
    let images = &cfg.images;
    for (field, value) in [
        ("jpeg_quality", images.jpeg_quality),
        ("avif_quality", images.avif_quality),
    ] {
        if !(1..=100).contains(&value) {
            return Err(config_error(format!(
                "[images].{field} must be within 1..=100 (got {value})"
            )));
        }
    }
    if !(1..=10).contains(&images.avif_speed) {
        return Err(config_error(format!(
            "[images].avif_speed must be within 1..=10 (got {})",
            images.avif_speed
        )));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.queue_length == 0 {
        return Err(config_error("[watch].queue_length must be >= 1 (got 0)"));
    }

    for (idx, binding) in cfg.watch.bindings.iter().enumerate() {
        if binding.watch.is_empty() {
            return Err(config_error(format!(
                "watch binding #{idx} has no `watch` patterns"
            )));
        }
        for pattern in binding.watch.iter().chain(binding.exclude.iter()) {
            check_glob(&format!("watch binding #{idx}"), pattern)?;
        }

        match (&binding.run, binding.reload) {
            (Some(_), true) => {
                return Err(config_error(format!(
                    "watch binding #{idx} sets both `run` and `reload`"
                )));
            }
            (None, false) => {
                return Err(config_error(format!(
                    "watch binding #{idx} must set either `run` or `reload = true`"
                )));
            }
            (Some(task), false) => match tasks::lookup(task) {
                Some(def) if matches!(def.kind, TaskKind::Transform(_)) => {}
                Some(_) => {
                    return Err(config_error(format!(
                        "watch binding #{idx} runs '{task}', which is a service and cannot be re-run"
                    )));
                }
                None => {
                    return Err(SitepipeError::TaskNotFound(format!(
                        "'{task}' (referenced by watch binding #{idx})"
                    )));
                }
            },
            (None, true) => {}
        }
    }
    Ok(())
}

fn check_glob(field: &str, pattern: &str) -> Result<()> {
    Glob::new(pattern)
        .map(|_| ())
        .map_err(|e| config_error(format!("{field}: invalid glob pattern '{pattern}': {e}")))
}
