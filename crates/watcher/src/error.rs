//! Watcher error types

use thiserror::Error;

/// Errors raised while building or running the watch pipeline
#[derive(Debug, Error)]
pub enum WatchError {
    /// Malformed watch input, rejected before any thread starts
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The OS notification backend failed
    #[error("notification backend error: {0}")]
    Source(#[from] notify::Error),

    /// The notification source hung up while the watcher was running
    #[error("notification source disconnected")]
    Disconnected,
}

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;
