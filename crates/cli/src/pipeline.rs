//! Wiring of watcher, debouncer and engines
//!
//! ```text
//! NotificationSource -> ChangeWatcher -> [Debouncer] -> EngineRegistry -> SyncEngine
//! ```

use crate::config::Config;
use anyhow::{Context, Result};
use engine::{EngineRegistry, Notifier, SyncEngine, VersionOracle};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use sync_core::{CancelToken, ChangeEvent};
use tracing::{error, info, warn};
use watcher::{ChangeWatcher, Debouncer, NotificationSource};

/// Assembled but not yet running pipeline
pub struct Pipeline<S: NotificationSource> {
    watcher: ChangeWatcher<S>,
    debouncer: Option<Arc<Debouncer<ChangeEvent>>>,
    registry: Arc<EngineRegistry>,
}

impl<S: NotificationSource + 'static> Pipeline<S> {
    /// Build every stage from `config`; nothing runs yet
    pub fn build(
        config: &Config,
        source: S,
        oracle: Arc<dyn VersionOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let watcher = ChangeWatcher::new(source, config.watch.paths.clone())
            .context("Invalid watch paths")?
            .with_poll_timeout(config.poll_timeout());

        let engines = watcher.registration().paths().into_iter().map(|path| {
            SyncEngine::new(path, Arc::clone(&oracle), Arc::clone(&notifier))
                .with_post_push(config.remote.post_push)
        });
        let registry = Arc::new(EngineRegistry::new(engines));

        let debouncer = if config.debounce.enabled {
            let debouncer = Arc::new(Debouncer::new(config.debounce_config())?);
            debouncer.attach(&watcher.bus());
            let target = Arc::clone(&registry);
            debouncer.subscribe(move |event: &ChangeEvent| {
                target.submit(event);
                Ok(())
            });
            Some(debouncer)
        } else {
            let target = Arc::clone(&registry);
            watcher.subscribe(move |event: &ChangeEvent| {
                target.submit(event);
                Ok(())
            });
            None
        };

        Ok(Self {
            watcher,
            debouncer,
            registry,
        })
    }

    pub fn registry(&self) -> Arc<EngineRegistry> {
        Arc::clone(&self.registry)
    }

    /// Reconcile every file once, then start workers, debouncer and watcher
    pub fn start(self) -> Result<RunningPipeline> {
        let Self {
            mut watcher,
            debouncer,
            registry,
        } = self;

        for (path, result) in registry.reconcile_all() {
            match result {
                Ok(outcome) => info!(path = %path.display(), ?outcome, "Startup reconciliation"),
                Err(e) => warn!(path = %path.display(), "Startup reconciliation failed: {}", e),
            }
        }

        registry.start().context("Failed to start sync workers")?;
        if let Some(debouncer) = &debouncer {
            debouncer.start().context("Failed to start debouncer")?;
        }

        let stop = watcher.stop_handle();
        let handle = thread::Builder::new()
            .name("change-watcher".to_string())
            .spawn(move || {
                if let Err(e) = watcher.start() {
                    error!("Change watcher failed: {}", e);
                    return Err(e);
                }
                Ok(())
            })
            .context("Failed to spawn watcher thread")?;

        Ok(RunningPipeline {
            stop,
            watcher: Some(handle),
            debouncer,
            registry,
        })
    }
}

/// Handle on a started pipeline
pub struct RunningPipeline {
    stop: CancelToken,
    watcher: Option<JoinHandle<watcher::Result<()>>>,
    debouncer: Option<Arc<Debouncer<ChangeEvent>>>,
    registry: Arc<EngineRegistry>,
}

impl RunningPipeline {
    pub fn registry(&self) -> Arc<EngineRegistry> {
        Arc::clone(&self.registry)
    }

    /// Whether the watcher thread exited on its own
    pub fn watcher_exited(&self) -> bool {
        self.watcher.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the watcher, then the debouncer, then drain the workers
    pub fn shutdown(mut self) -> Result<()> {
        self.stop.cancel();
        let watched = match self.watcher.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow::anyhow!("Watcher thread panicked"))?
                .context("Change watcher failed"),
            None => Ok(()),
        };

        if let Some(debouncer) = &self.debouncer {
            debouncer.stop();
        }
        self.registry.stop();

        info!("Pipeline stopped");
        watched
    }
}
