//! Version oracle seam
//!
//! The oracle is the only way the engine learns about content: a local
//! fingerprint, a remote fingerprint and a push. Calls may block for an
//! external round trip and are never retried by the engine.

use crate::error::OracleError;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use sync_core::Fingerprint;
use tracing::warn;

/// Gateway to local content and the remote store
pub trait VersionOracle: Send + Sync {
    /// Fingerprint of the local file
    fn local_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError>;

    /// Fingerprint of the remote counterpart
    fn remote_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError>;

    /// Upload the local file, overwriting the remote copy when `force`
    fn push(&self, path: &Path, force: bool) -> Result<(), OracleError>;
}

impl<O: VersionOracle + ?Sized> VersionOracle for Arc<O> {
    fn local_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        (**self).local_fingerprint(path)
    }

    fn remote_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        (**self).remote_fingerprint(path)
    }

    fn push(&self, path: &Path, force: bool) -> Result<(), OracleError> {
        (**self).push(path, force)
    }
}

/// Oracle wrapper that bounds every call with a timeout
///
/// Each call runs on a helper thread. When the time box expires the engine
/// gets `OracleError::Timeout` and moves on; the helper thread is left to
/// finish (or hang) on its own and its result is discarded.
pub struct Timeboxed<O> {
    inner: Arc<O>,
    timeout: Duration,
}

impl<O: VersionOracle + 'static> Timeboxed<O> {
    /// Wrap `inner`, allowing each call `timeout`
    pub fn new(inner: O, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    fn call<R, F>(&self, op: &'static str, path: &Path, f: F) -> Result<R, OracleError>
    where
        R: Send + 'static,
        F: FnOnce(&O, &Path) -> Result<R, OracleError> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let inner = Arc::clone(&self.inner);
        let owned: PathBuf = path.to_path_buf();

        thread::Builder::new()
            .name(format!("oracle-{}", op))
            .spawn(move || {
                let _ = tx.send(f(inner.as_ref(), owned.as_path()));
            })
            .map_err(|source| OracleError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(path = %path.display(), op, "Oracle call timed out after {:?}", self.timeout);
                Err(OracleError::Timeout {
                    op,
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Other(anyhow::anyhow!(
                "{} worker exited without answering",
                op
            ))),
        }
    }
}

impl<O: VersionOracle + 'static> VersionOracle for Timeboxed<O> {
    fn local_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        self.call("local fingerprint", path, |o, p| o.local_fingerprint(p))
    }

    fn remote_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        self.call("remote fingerprint", path, |o, p| o.remote_fingerprint(p))
    }

    fn push(&self, path: &Path, force: bool) -> Result<(), OracleError> {
        self.call("push", path, move |o, p| o.push(p, force))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sleepy {
        delay: Duration,
    }

    impl VersionOracle for Sleepy {
        fn local_fingerprint(&self, _path: &Path) -> Result<Fingerprint, OracleError> {
            thread::sleep(self.delay);
            Ok(Fingerprint::from("local"))
        }

        fn remote_fingerprint(&self, _path: &Path) -> Result<Fingerprint, OracleError> {
            thread::sleep(self.delay);
            Ok(Fingerprint::from("remote"))
        }

        fn push(&self, _path: &Path, _force: bool) -> Result<(), OracleError> {
            Err(OracleError::Parse("no".to_string()))
        }
    }

    #[test]
    fn test_fast_calls_pass_through() {
        let oracle = Timeboxed::new(Sleepy { delay: Duration::ZERO }, Duration::from_secs(5));
        let path = Path::new("/tmp/file");
        assert_eq!(oracle.local_fingerprint(path).unwrap(), Fingerprint::from("local"));
        assert_eq!(oracle.remote_fingerprint(path).unwrap(), Fingerprint::from("remote"));
        assert!(matches!(oracle.push(path, true), Err(OracleError::Parse(_))));
    }

    #[test]
    fn test_slow_call_times_out() {
        let oracle = Timeboxed::new(
            Sleepy {
                delay: Duration::from_secs(2),
            },
            Duration::from_millis(50),
        );
        let err = oracle.remote_fingerprint(Path::new("/tmp/file")).unwrap_err();
        assert!(matches!(
            err,
            OracleError::Timeout {
                op: "remote fingerprint",
                ..
            }
        ));
    }
}
