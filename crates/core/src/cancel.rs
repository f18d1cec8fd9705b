//! Cooperative cancellation shared between worker threads
//!
//! Cancelling drops the only sender of an internal channel, so every clone's
//! receiver becomes ready at once. Loops can therefore wait on the token
//! inside `crossbeam_channel::select!` next to their real work instead of
//! polling a flag.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Cloneable stop signal
#[derive(Debug, Clone)]
pub struct CancelToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Cancel the token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel that becomes ready (disconnected) once cancelled
    ///
    /// Intended for `select!`; it never yields a message.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal
    }

    /// Block for up to `timeout`. Returns true if cancelled meanwhile.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
