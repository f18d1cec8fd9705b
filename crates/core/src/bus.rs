//! Synchronous multi-subscriber publish/subscribe
//!
//! `publish` runs every handler on the caller's thread, in registration
//! order. A handler that blocks delays the publisher (this is the
//! backpressure point between stages); a handler that fails or panics is
//! logged and skipped so the remaining handlers still run.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// Subscriber callback
pub type Handler<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// One-to-many event fan-out
pub struct EventBus<T> {
    /// Name used in log lines
    name: &'static str,
    /// Handlers in registration order
    handlers: RwLock<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> EventBus<T> {
    /// Create an empty bus
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler; it receives every event published afterwards
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver `event` to every handler
    ///
    /// Returns the number of handlers that failed or panicked.
    pub fn publish(&self, event: &T) -> usize {
        // Snapshot so handlers may (un)subscribe without deadlocking
        let handlers: Vec<(SubscriptionId, Handler<T>)> = self
            .handlers
            .read()
            .iter()
            .map(|(id, handler)| (*id, Arc::clone(handler)))
            .collect();

        let mut failures = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(bus = self.name, subscriber = id.0, "Subscriber failed: {:#}", e);
                }
                Err(panic) => {
                    failures += 1;
                    error!(
                        bus = self.name,
                        subscriber = id.0,
                        "Subscriber panicked: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        failures
    }
}

impl<T: Send + Sync + 'static> EventBus<T> {
    /// Chain this bus into `downstream`: everything published here is
    /// re-published there
    pub fn relay(&self, downstream: Arc<EventBus<T>>) -> SubscriptionId {
        self.subscribe(move |event| {
            downstream.publish(event);
            Ok(())
        })
    }
}

impl<T> std::fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
