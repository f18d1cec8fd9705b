//! File system watching for drivesync
//!
//! This crate provides:
//! - Directory/file registration built from the watched path list
//! - A change watcher that filters raw notifications down to watched files
//! - Per-file debouncing (quiet-period trigger)
//! - The `notify`-backed notification source

pub mod debounce;
pub mod error;
pub mod platform;
pub mod registration;

pub use debounce::{DebounceConfig, Debouncer};
pub use error::{Result, WatchError};
pub use platform::{ChannelSource, NotificationSource, NotifySource, RawFlag, RawNotification};
pub use registration::{WatchPaths, WatchRegistration};

use crossbeam_channel::select;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{CancelToken, ChangeEvent, EventBus, SubscriptionId};
use tracing::{debug, info, trace};

/// Upper bound on how long the run loop blocks before re-checking for stop
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Watches registered files and publishes a [`ChangeEvent`] per relevant
/// notification
///
/// Subscribers run synchronously on the watcher thread before the next raw
/// notification is drained. A slow subscriber therefore delays the OS
/// queue; put a [`Debouncer`] or another queue in between if subscribers
/// do real work.
pub struct ChangeWatcher<S: NotificationSource> {
    registration: WatchRegistration,
    source: S,
    bus: Arc<EventBus<ChangeEvent>>,
    cancel: CancelToken,
    poll_timeout: Duration,
}

impl<S: NotificationSource> ChangeWatcher<S> {
    /// Build the registration for `paths` on top of `source`
    ///
    /// Malformed input fails here, before any thread is started.
    pub fn new(source: S, paths: impl Into<WatchPaths>) -> Result<Self> {
        Ok(Self {
            registration: WatchRegistration::new(paths)?,
            source,
            bus: Arc::new(EventBus::new("watcher")),
            cancel: CancelToken::new(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        })
    }

    /// Override the bounded wait of the run loop
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Watched directories and files
    pub fn registration(&self) -> &WatchRegistration {
        &self.registration
    }

    /// Register a subscriber for accepted change events
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Bus the watcher publishes on (for chaining)
    pub fn bus(&self) -> Arc<EventBus<ChangeEvent>> {
        Arc::clone(&self.bus)
    }

    /// Token that stops the run loop; hand it to whoever handles shutdown
    pub fn stop_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask the run loop to exit. Never interrupts a dispatch in progress.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Register one watch per directory and run until stopped
    ///
    /// Blocks the calling thread.
    pub fn start(&mut self) -> Result<()> {
        for (dir, files) in self.registration.directories() {
            info!(
                dir = %dir.display(),
                files = ?files,
                "Starting to watch {} file(s)",
                files.len()
            );
            self.source.watch_directory(dir)?;
        }

        let notifications = self.source.notifications().clone();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            select! {
                recv(notifications) -> msg => match msg {
                    Ok(raw) => {
                        self.dispatch(raw);
                    }
                    Err(_) => return Err(WatchError::Disconnected),
                },
                recv(self.cancel.signal()) -> _ => break,
                default(self.poll_timeout) => {}
            }
        }

        info!("Change watcher stopped");
        Ok(())
    }

    /// Filter one raw notification and publish it if it concerns a watched
    /// file. Returns the published event.
    pub fn dispatch(&self, raw: RawNotification) -> Option<ChangeEvent> {
        let Some(name) = raw.name.as_deref() else {
            trace!(dir = %raw.directory.display(), "Notification without a name ignored");
            return None;
        };

        if !self.registration.contains(&raw.directory, name) {
            trace!(dir = %raw.directory.display(), name, "Unwatched file ignored");
            return None;
        }

        let event = ChangeEvent::new(&raw.directory, name);
        debug!(path = %event.path.display(), flags = ?raw.flags, "Change detected");
        self.bus.publish(&event);
        Some(event)
    }
}
