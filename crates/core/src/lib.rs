//! Drivesync Core - shared primitives for the sync pipeline
//!
//! This crate provides the pieces every stage of the pipeline agrees on:
//! - Normalized change events
//! - Synchronous publish/subscribe bus
//! - Cooperative cancellation tokens
//! - Content fingerprints (BLAKE3)

pub mod bus;
pub mod cancel;
pub mod event;
pub mod hash;

// Re-export main types for convenience
pub use bus::{EventBus, SubscriptionId};
pub use cancel::CancelToken;
pub use event::{ChangeEvent, Keyed};
pub use hash::Fingerprint;

/// Common result type used throughout sync-core
pub type Result<T> = anyhow::Result<T>;
