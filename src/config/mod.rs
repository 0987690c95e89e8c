// src/config/mod.rs

//! Configuration loading and validation for sitepipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate invariants like quality ranges and watch bindings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve};
pub use model::{
    ConfigFile, FaviconsSection, FontsSection, HtmlSection, ImagesSection, PathsSection,
    RawConfigFile, ReleaseSection, ScriptsSection, ServerSection, SpriteSection, StylesSection,
    WatchBindingConfig, WatchSection, default_bindings,
};
