// src/server/reload.rs

//! Fan-out of reload signals to connected browser sessions.

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::ReloadKind;

/// Signals buffered per session before it starts lagging.
const RELOAD_CHANNEL_CAPACITY: usize = 64;

/// A request for connected browsers to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadSignal {
    pub kind: ReloadKind,
    /// What caused the reload (a task name or a changed path).
    pub reason: String,
}

/// Broadcast hub shared by the dev server, the executor and the watcher.
///
/// Sending never fails: with no session connected the signal is dropped.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<ReloadSignal>,
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadSignal> {
        self.tx.subscribe()
    }

    /// Number of sessions currently listening.
    pub fn session_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast a signal; returns how many sessions received it.
    pub fn send(&self, kind: ReloadKind, reason: impl Into<String>) -> usize {
        let signal = ReloadSignal {
            kind,
            reason: reason.into(),
        };
        match self.tx.send(signal) {
            Ok(n) => {
                debug!(event = kind.event_name(), sessions = n, "reload signal sent");
                n
            }
            Err(_) => 0,
        }
    }
}
