//! Low-level notification sources
//!
//! A source places directory watches and hands raw notifications to the
//! watcher over a channel, so the run loop can block on readiness with a
//! bounded timeout. Only two kinds are forwarded: content closed after
//! write, and an entry moved into the directory.

use crate::error::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Kernel event kinds the watcher cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFlag {
    /// File closed after being opened for writing
    CloseWrite,
    /// Entry renamed/moved into the watched directory
    MovedTo,
}

/// Notification as reported by the OS, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// Watched directory the entry lives in
    pub directory: PathBuf,
    /// Entry name, if the backend reported one and it is valid UTF-8
    pub name: Option<String>,
    /// What happened
    pub flags: Vec<RawFlag>,
}

/// Something that can watch directories and report raw notifications
pub trait NotificationSource: Send {
    /// Start watching `dir` (non-recursively)
    fn watch_directory(&mut self, dir: &Path) -> Result<()>;

    /// Channel the watcher blocks on
    fn notifications(&self) -> &Receiver<RawNotification>;
}

/// Source backed by the platform's native notification API via `notify`
pub struct NotifySource {
    watcher: RecommendedWatcher,
    rx: Receiver<RawNotification>,
}

impl NotifySource {
    /// Create the backend; no directory is watched yet
    pub fn new() -> Result<Self> {
        let (tx, rx) = unbounded();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in translate(&event) {
                    // Receiver gone means the watcher is shutting down
                    let _ = tx.send(raw);
                }
            }
            Err(e) => warn!("Notification backend error: {}", e),
        })?;

        Ok(Self { watcher, rx })
    }
}

impl NotificationSource for NotifySource {
    fn watch_directory(&mut self, dir: &Path) -> Result<()> {
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        debug!(dir = %dir.display(), "Directory watch registered");
        Ok(())
    }

    fn notifications(&self) -> &Receiver<RawNotification> {
        &self.rx
    }
}

/// Source fed by hand through a channel
///
/// Used to inject synthetic notifications (tests, replays).
pub struct ChannelSource {
    tx: Sender<RawNotification>,
    rx: Receiver<RawNotification>,
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl ChannelSource {
    /// Create an empty source
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            watched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sender used to inject notifications
    pub fn sender(&self) -> Sender<RawNotification> {
        self.tx.clone()
    }

    /// Shared view of the directories registered so far
    pub fn watched(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.watched)
    }
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSource for ChannelSource {
    fn watch_directory(&mut self, dir: &Path) -> Result<()> {
        self.watched.lock().push(dir.to_path_buf());
        Ok(())
    }

    fn notifications(&self) -> &Receiver<RawNotification> {
        &self.rx
    }
}

/// Map a backend event kind to the flag we forward, if any
#[cfg(target_os = "linux")]
fn classify(kind: &EventKind) -> Option<RawFlag> {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(RawFlag::CloseWrite),
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
            Some(RawFlag::MovedTo)
        }
        _ => None,
    }
}

/// FSEvents and ReadDirectoryChanges never report close-after-write, so a
/// data modification or creation stands in for it.
#[cfg(not(target_os = "linux"))]
fn classify(kind: &EventKind) -> Option<RawFlag> {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Create(_) => Some(RawFlag::CloseWrite),
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
            Some(RawFlag::MovedTo)
        }
        _ => None,
    }
}

/// Turn one backend event into raw notifications
fn translate(event: &Event) -> Vec<RawNotification> {
    let Some(flag) = classify(&event.kind) else {
        return Vec::new();
    };

    // A paired rename carries [from, to]; only the destination matters
    let paths: &[PathBuf] = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().map(std::slice::from_ref).unwrap_or_default()
        }
        _ => &event.paths,
    };

    paths
        .iter()
        .filter_map(|path| {
            let directory = path.parent()?.to_path_buf();
            let name = path.file_name().and_then(|n| n.to_str()).map(str::to_string);
            Some(RawNotification {
                directory,
                name,
                flags: vec![flag],
            })
        })
        .collect()
}
