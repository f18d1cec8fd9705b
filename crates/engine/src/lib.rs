//! Per-file synchronization for drivesync
//!
//! This crate provides:
//! - The per-file state machine (`SyncEngine`)
//! - The seams to the outside world (`VersionOracle`, `Notifier`)
//! - Path-keyed dispatch with serialized entry per file (`EngineRegistry`)
//! - Periodic remote polling (`PeriodicReconciler`)

pub mod engine;
pub mod error;
pub mod notifier;
pub mod oracle;
pub mod reconcile;
pub mod registry;
pub mod state;

// Re-exports
pub use engine::{Outcome, PostPushPolicy, SyncEngine};
pub use error::{OracleError, SyncError};
pub use notifier::{LogNotifier, Notifier};
pub use oracle::{Timeboxed, VersionOracle};
pub use reconcile::PeriodicReconciler;
pub use registry::{EngineRegistry, Trigger};
pub use state::{SyncSnapshot, SyncState};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, SyncError>;
