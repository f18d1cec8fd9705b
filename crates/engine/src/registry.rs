//! Path-keyed engine dispatch
//!
//! Each engine gets a worker thread fed by a single-slot queue. A change for
//! a file whose worker is busy is coalesced into the one queued check, which
//! reads fresh versions when it runs. A hung oracle call therefore stalls
//! only its own file.

use crate::engine::{Outcome, SyncEngine};
use crate::error::SyncError;
use crate::Result;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use sync_core::ChangeEvent;
use tracing::{debug, info, warn};

/// Why an engine is asked to look at its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The watcher (or debouncer) reported a change
    Change,
    /// Periodic poll of the remote side
    Reconcile,
}

struct Worker {
    queue: Sender<Trigger>,
    handle: JoinHandle<()>,
}

/// All engines of one process, keyed by watched path
pub struct EngineRegistry {
    engines: BTreeMap<PathBuf, Arc<SyncEngine>>,
    workers: Mutex<BTreeMap<PathBuf, Worker>>,
}

impl EngineRegistry {
    /// Registry over `engines`; a later engine for the same path replaces
    /// an earlier one
    pub fn new(engines: impl IntoIterator<Item = SyncEngine>) -> Self {
        let engines = engines
            .into_iter()
            .map(|engine| (engine.path().to_path_buf(), Arc::new(engine)))
            .collect();
        Self {
            engines,
            workers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Engine for `path`
    pub fn get(&self, path: &Path) -> Option<&Arc<SyncEngine>> {
        self.engines.get(path)
    }

    /// Watched paths in order
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.engines.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Spawn one worker per engine. Until this is called every dispatch
    /// runs inline on the caller's thread.
    pub fn start(&self) -> std::io::Result<()> {
        let mut workers = self.workers.lock();
        for (path, engine) in &self.engines {
            if workers.contains_key(path) {
                continue;
            }

            let (queue, rx) = bounded::<Trigger>(1);
            let engine = Arc::clone(engine);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let handle = thread::Builder::new()
                .name(format!("sync-{}", name))
                .spawn(move || {
                    for trigger in rx.iter() {
                        work(&engine, trigger);
                    }
                    debug!(path = %engine.path().display(), "Sync worker exited");
                })?;

            workers.insert(path.clone(), Worker { queue, handle });
        }

        info!("Started {} sync worker(s)", workers.len());
        Ok(())
    }

    /// Route a change event to its engine. Returns false for paths nobody
    /// watches.
    pub fn submit(&self, event: &ChangeEvent) -> bool {
        self.dispatch(&event.path, Trigger::Change)
    }

    /// Ask every engine to check its file; returns how many were reached
    pub fn request_reconcile_all(&self) -> usize {
        self.engines
            .keys()
            .filter(|path| self.dispatch(path, Trigger::Reconcile))
            .count()
    }

    /// Check every file now on the caller's thread, in path order
    pub fn reconcile_all(&self) -> Vec<(PathBuf, Result<Outcome>)> {
        self.engines
            .iter()
            .map(|(path, engine)| (path.clone(), run(engine, Trigger::Reconcile)))
            .collect()
    }

    /// Close every queue and wait for workers to drain. Checks already
    /// queued still run.
    pub fn stop(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for (path, worker) in workers {
            drop(worker.queue);
            if worker.handle.join().is_err() {
                warn!(path = %path.display(), "Sync worker panicked");
            }
        }
    }

    fn dispatch(&self, path: &Path, trigger: Trigger) -> bool {
        let Some(engine) = self.engines.get(path) else {
            debug!(path = %path.display(), "No engine for path, ignored");
            return false;
        };

        let queue = self.workers.lock().get(path).map(|w| w.queue.clone());
        match queue {
            Some(queue) => match queue.try_send(trigger) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(path = %path.display(), ?trigger, "Check already queued, coalesced");
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!(path = %path.display(), "Sync worker is gone, trigger dropped");
                    return false;
                }
            },
            None => work(engine, trigger),
        }
        true
    }
}

impl Drop for EngineRegistry {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("paths", &self.engines.keys().collect::<Vec<_>>())
            .field("workers", &self.workers.lock().len())
            .finish()
    }
}

/// Run a trigger whose result nobody waits for
///
/// Oracle failures were already warned about by the engine; the file is
/// retried on its next trigger.
fn work(engine: &SyncEngine, trigger: Trigger) {
    match run(engine, trigger) {
        Ok(outcome) => debug!(path = %engine.path().display(), ?trigger, ?outcome, "Trigger handled"),
        Err(SyncError::Halted { .. }) => {}
        Err(e) => debug!(
            path = %engine.path().display(),
            ?trigger,
            "Trigger failed, waiting for the next one: {}",
            e
        ),
    }
}

fn run(engine: &SyncEngine, trigger: Trigger) -> Result<Outcome> {
    debug!(path = %engine.path().display(), ?trigger, "Checking file");
    let result = engine.handle_change();
    if let Err(SyncError::Halted { path }) = &result {
        debug!(path = %path.display(), "Engine halted, trigger skipped");
    }
    result
}
