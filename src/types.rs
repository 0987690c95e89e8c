use serde::Deserialize;

/// Behaviour when a watch trigger arrives for a task that is already part of
/// the active run.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued triggers and only keep the latest.
///   Running transforms are never interrupted; only queued triggers are
///   affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    Queue,
    Cancel,
}

impl Default for TriggerWhileRunningBehaviour {
    fn default() -> Self {
        TriggerWhileRunningBehaviour::Queue
    }
}

/// Mode for storing watch binding hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashStorageMode {
    /// Store hashes in a file (`.sitepipe/hashes.json`).
    File,
    /// Store hashes in memory only (lost on restart).
    Memory,
}

impl Default for HashStorageMode {
    fn default() -> Self {
        HashStorageMode::Memory
    }
}

/// What a connected browser session should do when it receives a reload
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// Reload the whole page.
    Full,
    /// Re-fetch stylesheets without reloading the page.
    Styles,
}

impl ReloadKind {
    /// Name of the server-sent event carrying this signal.
    pub fn event_name(self) -> &'static str {
        match self {
            ReloadKind::Full => "reload",
            ReloadKind::Styles => "css",
        }
    }
}
