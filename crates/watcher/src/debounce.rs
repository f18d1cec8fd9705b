//! Per-source debouncing
//!
//! Collapses a burst of events for one key into its last member and emits
//! it once the key has been quiet for `cooldown`. Events arriving faster
//! than `cooldown` keep postponing the emission (quiet-period trigger, not a
//! fixed-rate throttle).
//!
//! The receiving side and the periodic checker share the pending map behind
//! one mutex. Downstream publication happens on the checker thread with the
//! lock released.

use crate::error::{Result, WatchError};
use crossbeam_channel::{select, tick};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sync_core::{CancelToken, EventBus, Keyed, SubscriptionId};
use tracing::{debug, trace};

/// Debounce timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period required before an event is emitted
    pub cooldown: Duration,
    /// How often the checker wakes up; bounds the added latency
    pub check_interval: Duration,
}

impl DebounceConfig {
    /// Cooldown with a check interval of 1/60th of it (at least 1ms)
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            check_interval: (cooldown / 60).max(Duration::from_millis(1)),
        }
    }

    /// Override the check interval
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    /// Reject intervals that cannot debounce anything
    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(WatchError::InvalidArgument(
                "debounce check interval must be positive".to_string(),
            ));
        }
        if self.check_interval >= self.cooldown {
            return Err(WatchError::InvalidArgument(format!(
                "debounce check interval ({:?}) must be smaller than cooldown ({:?})",
                self.check_interval, self.cooldown
            )));
        }
        Ok(())
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

/// Last event seen for one key
struct Pending<T> {
    received_at: Instant,
    payload: T,
}

type PendingMap<T> = HashMap<<T as Keyed>::Key, Pending<T>>;

/// Aggregating relay between an upstream publisher and downstream subscribers
pub struct Debouncer<T: Keyed> {
    config: DebounceConfig,
    pending: Arc<Mutex<PendingMap<T>>>,
    output: Arc<EventBus<T>>,
    cancel: CancelToken,
    checker: Mutex<Option<JoinHandle<()>>>,
}

impl<T> Debouncer<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    /// Create a stopped debouncer
    pub fn new(config: DebounceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
            output: Arc::new(EventBus::new("debouncer")),
            cancel: CancelToken::new(),
            checker: Mutex::new(None),
        })
    }

    /// Timing in use
    pub fn config(&self) -> DebounceConfig {
        self.config
    }

    /// Record an event, replacing whatever was pending for its key
    pub fn push(&self, event: T) {
        let key = event.key();
        let mut pending = self.pending.lock();
        let replaced = pending
            .insert(
                key,
                Pending {
                    received_at: Instant::now(),
                    payload: event,
                },
            )
            .is_some();
        trace!(replaced, pending = pending.len(), "Debounced event recorded");
    }

    /// Subscribe this debouncer to an upstream bus
    pub fn attach(self: &Arc<Self>, upstream: &EventBus<T>) -> SubscriptionId {
        let this = Arc::clone(self);
        upstream.subscribe(move |event: &T| {
            this.push(event.clone());
            Ok(())
        })
    }

    /// Register a downstream handler
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.output.subscribe(handler)
    }

    /// Downstream bus
    pub fn output(&self) -> Arc<EventBus<T>> {
        Arc::clone(&self.output)
    }

    /// Number of keys with an event waiting for its quiet period
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Spawn the periodic checker. Calling it twice is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        let mut checker = self.checker.lock();
        if checker.is_some() || self.cancel.is_cancelled() {
            return Ok(());
        }

        let pending = Arc::clone(&self.pending);
        let output = Arc::clone(&self.output);
        let cancel = self.cancel.clone();
        let config = self.config;

        let handle = thread::Builder::new()
            .name("debounce-checker".to_string())
            .spawn(move || run_checker(config, pending, output, cancel))?;
        *checker = Some(handle);

        debug!(
            cooldown_ms = config.cooldown.as_millis() as u64,
            check_interval_ms = config.check_interval.as_millis() as u64,
            "Debouncer started"
        );
        Ok(())
    }

    /// Stop the checker and wait for it. Pending events are dropped.
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.checker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl<T: Keyed> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn run_checker<T>(
    config: DebounceConfig,
    pending: Arc<Mutex<PendingMap<T>>>,
    output: Arc<EventBus<T>>,
    cancel: CancelToken,
) where
    T: Keyed,
{
    let ticker = tick(config.check_interval);
    loop {
        select! {
            recv(cancel.signal()) -> _ => break,
            recv(ticker) -> _ => {
                for event in take_due(&pending, config.cooldown, Instant::now()) {
                    output.publish(&event);
                }
            }
        }
    }
    debug!("Debouncer stopped");
}

/// Remove and return every payload whose key has been quiet for `cooldown`
fn take_due<T: Keyed>(
    pending: &Mutex<PendingMap<T>>,
    cooldown: Duration,
    now: Instant,
) -> Vec<T> {
    let mut pending = pending.lock();
    let due: Vec<T::Key> = pending
        .iter()
        .filter(|(_, p)| now.saturating_duration_since(p.received_at) >= cooldown)
        .map(|(key, _)| key.clone())
        .collect();

    due.into_iter()
        .filter_map(|key| pending.remove(&key))
        .map(|p| p.payload)
        .collect()
}
