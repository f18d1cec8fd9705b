//! Engine error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a fingerprint or push call
#[derive(Debug, Error)]
pub enum OracleError {
    /// The gateway command exited unsuccessfully
    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// Local or remote I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The gateway answered with something we cannot interpret
    #[error("unexpected gateway output: {0}")]
    Parse(String),

    /// The call did not return within its time box
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// Anything else reported by a gateway
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of one `handle_change` invocation
#[derive(Debug, Error)]
pub enum SyncError {
    /// An oracle call failed; state was left unchanged
    #[error("{op} failed for {path}: {source}")]
    Oracle {
        path: PathBuf,
        op: &'static str,
        #[source]
        source: OracleError,
    },

    /// The engine found itself in a state it cannot act on
    #[error("unrecognized state for {path}: {detail}")]
    UnrecognizedState { path: PathBuf, detail: String },

    /// The engine stopped processing after an unrecognized state
    #[error("engine for {path} is halted")]
    Halted { path: PathBuf },
}
