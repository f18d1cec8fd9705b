//! User-facing notification seam

use tracing::{info, warn};

/// Fire-and-forget delivery of user notifications
pub trait Notifier: Send + Sync {
    /// Informational message (sync resumed, file pushed)
    fn info(&self, title: &str, message: &str);

    /// Something needs the user's attention (conflict)
    fn warning(&self, title: &str, message: &str);
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, title: &str, message: &str) {
        info!(target: "notification", title, "{}", message);
    }

    fn warning(&self, title: &str, message: &str) {
        warn!(target: "notification", title, "{}", message);
    }
}
