//! One-shot comparison of local and remote versions
//!
//! Fresh engines start in `Started`, so a check never pushes; it only
//! reports whether each file is in sync.

use crate::config::Config;
use anyhow::{Context, Result};
use engine::{EngineRegistry, Notifier, SyncEngine, SyncError, SyncState, VersionOracle};
use std::path::PathBuf;
use std::sync::Arc;
use watcher::WatchRegistration;

/// Where one file stands after a check
#[derive(Debug)]
pub enum FileStatus {
    InSync,
    Conflict,
    /// Reconciled, but neither in sync nor in conflict
    Unknown,
    /// The oracle could not answer
    Failed(SyncError),
}

impl FileStatus {
    /// Conflicts and failures make the check fail
    pub fn needs_attention(&self) -> bool {
        matches!(self, FileStatus::Conflict | FileStatus::Failed(_))
    }
}

/// Per-file results in path order
#[derive(Debug)]
pub struct CheckReport {
    pub files: Vec<(PathBuf, FileStatus)>,
}

impl CheckReport {
    pub fn attention(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, status)| status.needs_attention())
            .count()
    }

    /// Error when any file is in conflict or failed
    pub fn ensure_clean(&self) -> Result<()> {
        let attention = self.attention();
        if attention > 0 {
            anyhow::bail!(
                "{} of {} file(s) need attention",
                attention,
                self.files.len()
            );
        }
        Ok(())
    }
}

/// Reconcile every watched path once with fresh engines
///
/// Blocks on the oracle; call from a blocking context.
pub fn check(
    config: &Config,
    oracle: Arc<dyn VersionOracle>,
    notifier: Arc<dyn Notifier>,
) -> Result<CheckReport> {
    let registration =
        WatchRegistration::new(config.watch.paths.clone()).context("Invalid paths")?;
    let registry = EngineRegistry::new(registration.paths().into_iter().map(|path| {
        SyncEngine::new(path, Arc::clone(&oracle), Arc::clone(&notifier))
            .with_post_push(config.remote.post_push)
    }));

    let files = registry
        .reconcile_all()
        .into_iter()
        .map(|(path, result)| {
            let status = match result {
                Ok(_) => match registry.get(&path).map(|engine| engine.state()) {
                    Some(SyncState::Synchronized) => FileStatus::InSync,
                    Some(SyncState::Unsynchronized) => FileStatus::Conflict,
                    _ => FileStatus::Unknown,
                },
                Err(e) => FileStatus::Failed(e),
            };
            (path, status)
        })
        .collect();

    Ok(CheckReport { files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::OracleError;

    fn report(statuses: Vec<FileStatus>) -> CheckReport {
        CheckReport {
            files: statuses
                .into_iter()
                .enumerate()
                .map(|(i, status)| (PathBuf::from(format!("/data/{}.txt", i)), status))
                .collect(),
        }
    }

    #[test]
    fn test_clean_report_passes() {
        let report = report(vec![FileStatus::InSync, FileStatus::Unknown]);
        assert_eq!(report.attention(), 0);
        assert!(report.ensure_clean().is_ok());
    }

    #[test]
    fn test_conflicts_and_failures_need_attention() {
        let failure = SyncError::Oracle {
            path: PathBuf::from("/data/2.txt"),
            op: "remote fingerprint",
            source: OracleError::Parse("garbled".to_string()),
        };
        let report = report(vec![
            FileStatus::InSync,
            FileStatus::Conflict,
            FileStatus::Failed(failure),
        ]);

        assert_eq!(report.attention(), 2);
        let err = report.ensure_clean().unwrap_err();
        assert_eq!(err.to_string(), "2 of 3 file(s) need attention");
    }
}
