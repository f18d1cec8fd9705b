//! End-to-end checks against the native notification backend
//!
//! Linux only: other backends do not report close-after-write.

#![cfg(target_os = "linux")]

use crossbeam_channel::unbounded;
use std::fs;
use std::thread;
use std::time::Duration;
use sync_core::ChangeEvent;
use tempfile::TempDir;
use watcher::{ChangeWatcher, DebounceConfig, Debouncer, NotifySource};

#[test]
fn test_write_and_rename_into_place_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let target = root.join("notes.md");
    fs::write(&target, b"v1").unwrap();

    let mut watcher = ChangeWatcher::new(NotifySource::new().unwrap(), target.clone())
        .unwrap()
        .with_poll_timeout(Duration::from_millis(100));

    let (tx, rx) = unbounded();
    watcher.subscribe(move |event: &ChangeEvent| {
        tx.send(event.clone())?;
        Ok(())
    });

    let stop = watcher.stop_handle();
    let runner = thread::spawn(move || watcher.start());
    thread::sleep(Duration::from_millis(200));

    // Unwatched sibling: must stay silent
    fs::write(root.join("other.md"), b"noise").unwrap();

    // Plain write (close after write)
    fs::write(&target, b"v2").unwrap();
    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.path, target);
    assert_eq!(event.filename, "notes.md");

    // Editor-style save: write a temp file and rename it over the target
    let temp = root.join(".notes.md.tmp");
    fs::write(&temp, b"v3").unwrap();
    fs::rename(&temp, &target).unwrap();

    // Drain: every event must be for the watched file
    let mut saw_any = false;
    while let Ok(event) = rx.recv_timeout(Duration::from_millis(500)) {
        assert_eq!(event.path, target);
        saw_any = true;
    }
    assert!(saw_any, "rename into place was not reported");

    stop.cancel();
    runner.join().unwrap().unwrap();
}

#[test]
fn test_debounced_burst_reaches_subscriber_once() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    let target = root.join("burst.txt");

    let mut watcher = ChangeWatcher::new(NotifySource::new().unwrap(), target.clone())
        .unwrap()
        .with_poll_timeout(Duration::from_millis(100));

    let debouncer = std::sync::Arc::new(
        Debouncer::new(
            DebounceConfig::new(Duration::from_millis(300))
                .with_check_interval(Duration::from_millis(5)),
        )
        .unwrap(),
    );
    debouncer.attach(&watcher.bus());

    let (tx, rx) = unbounded();
    debouncer.subscribe(move |event: &ChangeEvent| {
        tx.send(event.clone())?;
        Ok(())
    });
    debouncer.start().unwrap();

    let stop = watcher.stop_handle();
    let runner = thread::spawn(move || watcher.start());
    thread::sleep(Duration::from_millis(200));

    for i in 0..5 {
        fs::write(&target, format!("write {}", i)).unwrap();
        thread::sleep(Duration::from_millis(10));
    }

    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.path, target);
    assert!(rx.recv_timeout(Duration::from_millis(800)).is_err());

    stop.cancel();
    runner.join().unwrap().unwrap();
    debouncer.stop();
}
