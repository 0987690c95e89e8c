// src/logging.rs

//! Logging setup for `sitepipe` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. the `--log-level` CLI flag
//! 2. the `SITEPIPE_LOG` environment variable, either a bare level
//!    (`debug`) or full `EnvFilter` directives (`info,sitepipe::watch=trace`)
//! 3. `info`
//!
//! Request logs from the dev server and watcher backend chatter stay one
//! level quieter than the crate's own logs unless directives say otherwise.
//! Everything goes to stderr.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no CLI level is given.
pub const LOG_ENV_VAR: &str = "SITEPIPE_LOG";

/// Dependencies whose logs are capped below the crate's level.
const NOISY_TARGETS: [&str; 3] = ["tower_http", "notify", "globset"];

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let filter = EnvFilter::try_new(filter_directives(cli_level, env_value.as_deref()))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

/// Build the `EnvFilter` directive string for the given inputs.
fn filter_directives(cli_level: Option<LogLevel>, env_value: Option<&str>) -> String {
    if let Some(lvl) = cli_level {
        return with_quiet_deps(level_from_log_level(lvl));
    }

    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => match parse_level_str(raw) {
            Some(level) => with_quiet_deps(level),
            None => raw.to_string(),
        },
        None => with_quiet_deps(Level::INFO),
    }
}

fn with_quiet_deps(level: Level) -> String {
    let quiet = quieter(level);
    let mut directives = level.as_str().to_ascii_lowercase();
    for target in NOISY_TARGETS {
        directives.push_str(&format!(",{target}={}", quiet.as_str().to_ascii_lowercase()));
    }
    directives
}

fn quieter(level: Level) -> Level {
    match level {
        Level::TRACE => Level::DEBUG,
        Level::DEBUG => Level::INFO,
        Level::INFO => Level::WARN,
        _ => Level::ERROR,
    }
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
