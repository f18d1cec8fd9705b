//! Synchronization state of one watched file

use std::fmt;
use sync_core::Fingerprint;

/// Where a file stands relative to its remote counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Not reconciled yet
    Started,
    /// Local and remote matched at the last check
    Synchronized,
    /// Diverged without being explained as a local-only change
    Unsynchronized,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Started => "started",
            SyncState::Synchronized => "synchronized",
            SyncState::Unsynchronized => "unsynchronized",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of an engine's memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    /// Current state
    pub state: SyncState,
    /// Remote fingerprint both sides last agreed on; always set when
    /// `state` is `Synchronized`
    pub last_known_remote: Option<Fingerprint>,
}

impl SyncSnapshot {
    /// Snapshot of a freshly constructed engine
    pub fn started() -> Self {
        Self {
            state: SyncState::Started,
            last_known_remote: None,
        }
    }

    /// Snapshot of an engine in sync at `remote`
    pub fn synchronized(remote: impl Into<Fingerprint>) -> Self {
        Self {
            state: SyncState::Synchronized,
            last_known_remote: Some(remote.into()),
        }
    }
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self::started()
    }
}
