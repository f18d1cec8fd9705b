//! Common utilities for integration tests

use cli_lib::config::{Backend, Config};
use cli_lib::gateway::MirrorGateway;
use engine::Notifier;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use watcher::{RawFlag, RawNotification};

/// A local directory plus a mirror directory acting as the remote
pub struct Workspace {
    _temp_dir: TempDir,
    /// Canonical local directory
    pub local: PathBuf,
    pub mirror_root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("local");
        let mirror_root = temp_dir.path().join("remote");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::create_dir_all(&mirror_root).unwrap();
        let local = local.canonicalize().unwrap();
        Self {
            _temp_dir: temp_dir,
            local,
            mirror_root,
        }
    }

    pub fn gateway(&self) -> MirrorGateway {
        MirrorGateway::new(&self.mirror_root)
    }

    pub fn write_local(&self, name: &str, content: &str) -> PathBuf {
        let path = self.local.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn write_remote(&self, name: &str, content: &str) {
        let remote = self.gateway().counterpart(&self.local.join(name));
        std::fs::create_dir_all(remote.parent().unwrap()).unwrap();
        std::fs::write(remote, content).unwrap();
    }

    pub fn read_remote(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.gateway().counterpart(&self.local.join(name))).ok()
    }

    /// Mirror backend with a short debounce over `names`
    pub fn config(&self, names: &[&str]) -> Config {
        let mut config = Config::default();
        config.watch.paths = names.iter().map(|n| self.local.join(n)).collect();
        config.watch.poll_timeout_ms = 50;
        config.debounce.cooldown_ms = 150;
        config.debounce.check_interval_ms = 10;
        config.remote.backend = Backend::Mirror;
        config.remote.mirror_root = Some(self.mirror_root.clone());
        config.notify.desktop = false;
        config
    }

    /// Close-after-write notification for `name`
    pub fn closed(&self, name: &str) -> RawNotification {
        RawNotification {
            directory: self.local.clone(),
            name: Some(name.to_string()),
            flags: vec![RawFlag::CloseWrite],
        }
    }
}

/// Notifier that keeps every notification title
#[derive(Default)]
pub struct RecordingNotifier {
    titles: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, title: &str, _message: &str) {
        self.titles.lock().unwrap().push(title.to_string());
    }

    fn warning(&self, title: &str, _message: &str) {
        self.titles.lock().unwrap().push(title.to_string());
    }
}

/// Poll `done` until it holds or `deadline` passes
pub fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    done()
}
