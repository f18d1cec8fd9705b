//! Per-file synchronization state machine
//!
//! | state | match      | differ, remote moved | differ, remote stable |
//! |-------|------------|----------------------|-----------------------|
//! | S     | -> Y, info | -> U, warning        | -> U, warning         |
//! | U     | -> Y, info | stay U, log          | stay U, log           |
//! | Y     | stay Y     | -> U, warning        | push, stay Y, info    |
//!
//! "match" compares content digests only. "remote moved" compares the full
//! remote fingerprint, revision included, with the last agreed one. A push
//! only ever happens from `Synchronized` when the remote has not moved, so a
//! remote change is never overwritten.

use crate::error::{OracleError, SyncError};
use crate::notifier::Notifier;
use crate::oracle::VersionOracle;
use crate::state::{SyncSnapshot, SyncState};
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sync_core::Fingerprint;
use tracing::{debug, error, info, warn};

/// Which fingerprint to remember as the remote version after a push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostPushPolicy {
    /// The local fingerprint that was just pushed
    #[default]
    AssumeLocal,
    /// Ask the remote again once the push succeeded
    RequeryRemote,
}

/// What one `handle_change` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Came into sync (from Started or Unsynchronized)
    Resumed,
    /// Entered Unsynchronized; the user was warned
    Conflict,
    /// Still in sync, nothing to do
    Unchanged,
    /// Still diverged, nothing to do
    StillConflicted,
    /// Local-only change pushed to the remote
    Pushed,
}

struct Memory {
    state: SyncState,
    last_known_remote: Option<Fingerprint>,
    halted: bool,
}

/// State machine for one watched file
pub struct SyncEngine {
    path: PathBuf,
    oracle: Arc<dyn VersionOracle>,
    notifier: Arc<dyn Notifier>,
    post_push: PostPushPolicy,
    /// Held for the whole of `handle_change`: one invocation per file at a time
    memory: Mutex<Memory>,
}

impl SyncEngine {
    /// New engine in `Started`
    pub fn new(
        path: impl Into<PathBuf>,
        oracle: Arc<dyn VersionOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            path: path.into(),
            oracle,
            notifier,
            post_push: PostPushPolicy::default(),
            memory: Mutex::new(Memory {
                state: SyncState::Started,
                last_known_remote: None,
                halted: false,
            }),
        }
    }

    /// Choose what is remembered after a push
    pub fn with_post_push(mut self, policy: PostPushPolicy) -> Self {
        self.post_push = policy;
        self
    }

    /// Seed the engine's memory from a snapshot
    ///
    /// The snapshot is not validated here; an inconsistent one surfaces as
    /// `UnrecognizedState` on the next `handle_change`.
    pub fn restore(self, snapshot: SyncSnapshot) -> Self {
        {
            let mut memory = self.memory.lock();
            memory.state = snapshot.state;
            memory.last_known_remote = snapshot.last_known_remote;
        }
        self
    }

    /// Watched file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state (waits for an in-flight `handle_change`)
    pub fn state(&self) -> SyncState {
        self.memory.lock().state
    }

    /// Current state and last agreed remote version
    pub fn snapshot(&self) -> SyncSnapshot {
        let memory = self.memory.lock();
        SyncSnapshot {
            state: memory.state,
            last_known_remote: memory.last_known_remote.clone(),
        }
    }

    /// Whether the engine stopped after an unrecoverable error
    pub fn is_halted(&self) -> bool {
        self.memory.lock().halted
    }

    /// React to a change of the file (or a periodic check)
    ///
    /// Oracle failures leave the state untouched and are returned; the next
    /// event retries naturally.
    pub fn handle_change(&self) -> Result<Outcome> {
        let mut memory = self.memory.lock();
        if memory.halted {
            return Err(SyncError::Halted {
                path: self.path.clone(),
            });
        }

        let local = self
            .oracle
            .local_fingerprint(&self.path)
            .map_err(|e| self.oracle_failure("local fingerprint", e))?;
        let remote = self
            .oracle
            .remote_fingerprint(&self.path)
            .map_err(|e| self.oracle_failure("remote fingerprint", e))?;
        let in_sync = local.same_content(&remote);

        debug!(
            path = %self.path.display(),
            state = %memory.state,
            local = %local,
            remote = %remote,
            "Versions fetched"
        );

        let outcome = match memory.state {
            SyncState::Started | SyncState::Unsynchronized if in_sync => {
                memory.state = SyncState::Synchronized;
                memory.last_known_remote = Some(remote);
                self.notifier.info(
                    "Auto-sync resumed",
                    &format!("{} is in sync with the remote copy", self.path.display()),
                );
                Outcome::Resumed
            }
            SyncState::Started => {
                memory.state = SyncState::Unsynchronized;
                self.warn_conflict();
                Outcome::Conflict
            }
            SyncState::Unsynchronized => {
                debug!(path = %self.path.display(), "Still out of sync, waiting for manual resolution");
                Outcome::StillConflicted
            }
            SyncState::Synchronized => {
                let Some(last_known) = memory.last_known_remote.clone() else {
                    memory.halted = true;
                    let err = SyncError::UnrecognizedState {
                        path: self.path.clone(),
                        detail: "synchronized without a known remote version".to_string(),
                    };
                    error!(path = %self.path.display(), "{}; engine halted", err);
                    return Err(err);
                };

                if in_sync {
                    debug!(path = %self.path.display(), "No content change");
                    memory.last_known_remote = Some(remote);
                    Outcome::Unchanged
                } else if remote != last_known {
                    memory.state = SyncState::Unsynchronized;
                    self.warn_conflict();
                    Outcome::Conflict
                } else {
                    self.oracle
                        .push(&self.path, true)
                        .map_err(|e| self.oracle_failure("push", e))?;
                    memory.last_known_remote = Some(self.version_after_push(local));
                    self.notifier.info(
                        "File synced",
                        &format!("{} was pushed to the remote", self.path.display()),
                    );
                    Outcome::Pushed
                }
            }
        };

        info!(
            path = %self.path.display(),
            state = %memory.state,
            outcome = ?outcome,
            "Change handled"
        );
        Ok(outcome)
    }

    fn version_after_push(&self, local: Fingerprint) -> Fingerprint {
        match self.post_push {
            PostPushPolicy::AssumeLocal => local,
            PostPushPolicy::RequeryRemote => match self.oracle.remote_fingerprint(&self.path) {
                Ok(remote) => remote,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        "Re-query after push failed, remembering local version: {}",
                        e
                    );
                    local
                }
            },
        }
    }

    fn warn_conflict(&self) {
        self.notifier.warning(
            "Resolve manually",
            &format!(
                "{} differs from the remote copy; auto-sync is paused for it",
                self.path.display()
            ),
        );
    }

    fn oracle_failure(&self, op: &'static str, source: OracleError) -> SyncError {
        warn!(path = %self.path.display(), op, "Oracle call failed, state unchanged: {}", source);
        SyncError::Oracle {
            path: self.path.clone(),
            op,
            source,
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("path", &self.path)
            .field("post_push", &self.post_push)
            .finish_non_exhaustive()
    }
}
