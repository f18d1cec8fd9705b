//! Remote gateways
//!
//! Implementations of `VersionOracle` for the supported remote stores.

pub mod drive;
pub mod mirror;

pub use drive::DriveGateway;
pub use mirror::MirrorGateway;

use crate::config::{Backend, Config};
use anyhow::{Context, Result};
use engine::{Timeboxed, VersionOracle};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Fingerprint reported for a remote file that does not exist
pub const ABSENT: &str = "absent";

/// Build the oracle selected by `config`
pub fn build(config: &Config) -> Result<Arc<dyn VersionOracle>> {
    let remote = &config.remote;
    let timeout = config.call_timeout();

    let oracle = match remote.backend {
        Backend::Drive => {
            info!(command = %remote.drive_command, "Using drive backend");
            let gateway = DriveGateway::new(&remote.drive_command).with_fingerprint(remote.fingerprint);
            time_boxed(gateway, timeout)
        }
        Backend::Mirror => {
            let root = remote
                .mirror_root
                .as_ref()
                .context("remote.mirror_root is required for the mirror backend")?;
            info!(root = %root.display(), "Using mirror backend");
            time_boxed(MirrorGateway::new(root), timeout)
        }
    };

    Ok(oracle)
}

fn time_boxed<O: VersionOracle + 'static>(oracle: O, timeout: Option<Duration>) -> Arc<dyn VersionOracle> {
    match timeout {
        Some(limit) => Arc::new(Timeboxed::new(oracle, limit)),
        None => Arc::new(oracle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_mirror_backend_is_built() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.remote.backend = Backend::Mirror;
        config.remote.mirror_root = Some(temp_dir.path().to_path_buf());
        config.remote.call_timeout_secs = 5;

        let oracle = build(&config).unwrap();
        let missing = PathBuf::from("/no/such/file.txt");
        assert_eq!(oracle.remote_fingerprint(&missing).unwrap().as_str(), ABSENT);
    }

    #[test]
    fn test_mirror_backend_requires_root() {
        let mut config = Config::default();
        config.remote.backend = Backend::Mirror;
        assert!(build(&config).is_err());
    }
}
