//! One-shot check over a mirror workspace

mod common;

use cli_lib::check::{check, FileStatus};
use common::{RecordingNotifier, Workspace};
use std::sync::Arc;

#[test]
fn test_conflicted_and_missing_files_fail_the_check() {
    let ws = Workspace::new();
    ws.write_local("synced.txt", "same");
    ws.write_remote("synced.txt", "same");
    ws.write_local("diverged.txt", "local edit");
    ws.write_remote("diverged.txt", "remote edit");
    // missing.txt exists on neither side: the local fingerprint fails

    let report = check(
        &ws.config(&["synced.txt", "diverged.txt", "missing.txt"]),
        Arc::new(ws.gateway()),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    let status = |name: &str| {
        report
            .files
            .iter()
            .find(|(path, _)| path.ends_with(name))
            .map(|(_, status)| status)
            .unwrap()
    };
    assert!(matches!(status("synced.txt"), FileStatus::InSync));
    assert!(matches!(status("diverged.txt"), FileStatus::Conflict));
    assert!(matches!(status("missing.txt"), FileStatus::Failed(_)));

    assert_eq!(report.attention(), 2);
    assert!(report.ensure_clean().is_err());

    // A check never pushes
    assert_eq!(ws.read_remote("diverged.txt").as_deref(), Some("remote edit"));
}

#[test]
fn test_all_in_sync_passes() {
    let ws = Workspace::new();
    ws.write_local("notes.txt", "v1");
    ws.write_remote("notes.txt", "v1");

    let report = check(
        &ws.config(&["notes.txt"]),
        Arc::new(ws.gateway()),
        Arc::new(RecordingNotifier::default()),
    )
    .unwrap();

    assert_eq!(report.files.len(), 1);
    assert!(report.ensure_clean().is_ok());
}
