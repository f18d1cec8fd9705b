//! Directory tree standing in for the remote store
//!
//! The remote copy of `/a/b/f` is `<root>/a/b/f`.

use super::ABSENT;
use engine::{OracleError, VersionOracle};
use std::io;
use std::path::{Component, Path, PathBuf};
use sync_core::Fingerprint;
use tempfile::NamedTempFile;
use tracing::debug;

/// Retries while a local file is still being written
const STABLE_RETRIES: u8 = 3;

#[derive(Debug, Clone)]
pub struct MirrorGateway {
    root: PathBuf,
}

impl MirrorGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Remote counterpart of a local path
    pub fn counterpart(&self, path: &Path) -> PathBuf {
        path.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl VersionOracle for MirrorGateway {
    fn local_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        Ok(Fingerprint::of_file_stable(path, STABLE_RETRIES)?)
    }

    fn remote_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        let remote = self.counterpart(path);
        if !remote.exists() {
            return Ok(Fingerprint::new(ABSENT));
        }
        Ok(Fingerprint::of_file(&remote)?)
    }

    fn push(&self, path: &Path, force: bool) -> Result<(), OracleError> {
        let remote = self.counterpart(path);
        if !force && remote.exists() {
            return Err(OracleError::Other(anyhow::anyhow!(
                "{} exists; refusing to overwrite without force",
                remote.display()
            )));
        }

        let io_error = |source: io::Error| OracleError::Io {
            path: remote.clone(),
            source,
        };
        let parent = remote.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(parent).map_err(io_error)?;

        // Copy next to the target, then rename over it
        let mut staged = NamedTempFile::new_in(parent).map_err(io_error)?;
        let mut local = std::fs::File::open(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        io::copy(&mut local, staged.as_file_mut()).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged.persist(&remote).map_err(|e| io_error(e.error))?;

        debug!(local = %path.display(), remote = %remote.display(), "Pushed to mirror");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, MirrorGateway) {
        let temp_dir = TempDir::new().unwrap();
        let local_dir = temp_dir.path().join("local");
        std::fs::create_dir_all(&local_dir).unwrap();
        let gateway = MirrorGateway::new(temp_dir.path().join("remote"));
        (temp_dir, local_dir, gateway)
    }

    #[test]
    fn test_counterpart_strips_root() {
        let gateway = MirrorGateway::new("/mnt/share");
        assert_eq!(
            gateway.counterpart(Path::new("/home/ana/notes.txt")),
            PathBuf::from("/mnt/share/home/ana/notes.txt")
        );
    }

    #[test]
    fn test_missing_remote_is_absent() {
        let (_guard, local_dir, gateway) = setup();
        let path = local_dir.join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(gateway.remote_fingerprint(&path).unwrap().as_str(), ABSENT);
        assert_ne!(gateway.local_fingerprint(&path).unwrap().as_str(), ABSENT);
    }

    #[test]
    fn test_push_makes_versions_equal() {
        let (_guard, local_dir, gateway) = setup();
        let path = local_dir.join("notes.txt");
        std::fs::write(&path, b"first").unwrap();

        gateway.push(&path, true).unwrap();
        assert_eq!(
            gateway.local_fingerprint(&path).unwrap(),
            gateway.remote_fingerprint(&path).unwrap()
        );

        std::fs::write(&path, b"second").unwrap();
        assert_ne!(
            gateway.local_fingerprint(&path).unwrap(),
            gateway.remote_fingerprint(&path).unwrap()
        );

        gateway.push(&path, true).unwrap();
        assert_eq!(
            std::fs::read(gateway.counterpart(&path)).unwrap(),
            b"second".to_vec()
        );
    }

    #[test]
    fn test_push_without_force_keeps_remote() {
        let (_guard, local_dir, gateway) = setup();
        let path = local_dir.join("notes.txt");
        std::fs::write(&path, b"local").unwrap();

        let remote = gateway.counterpart(&path);
        std::fs::create_dir_all(remote.parent().unwrap()).unwrap();
        std::fs::write(&remote, b"remote").unwrap();

        assert!(matches!(gateway.push(&path, false), Err(OracleError::Other(_))));
        assert_eq!(std::fs::read(&remote).unwrap(), b"remote".to_vec());
    }

    #[test]
    fn test_missing_local_file_is_an_error() {
        let (_guard, local_dir, gateway) = setup();
        assert!(gateway.local_fingerprint(&local_dir.join("gone.txt")).is_err());
    }
}
