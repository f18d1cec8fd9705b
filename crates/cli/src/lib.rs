//! Library side of the `dsync` binary
//!
//! Configuration, remote gateways, notification delivery and the wiring that
//! turns them into a running pipeline.

pub mod check;
pub mod config;
pub mod gateway;
pub mod locks;
pub mod logging;
pub mod notifier;
pub mod pipeline;

pub use check::{CheckReport, FileStatus};
pub use config::Config;
pub use pipeline::{Pipeline, RunningPipeline};
