//! Directory to filename registration
//!
//! Watches are placed on directories (so that editors which save by
//! writing a temp file and renaming it over the target are still seen),
//! and events are then filtered down to the registered file names.

use crate::error::{Result, WatchError};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Watch input: one path or a collection of paths
#[derive(Debug, Clone)]
pub enum WatchPaths {
    /// A single file
    Single(PathBuf),
    /// Several files, possibly spread over several directories
    Many(Vec<PathBuf>),
}

impl From<PathBuf> for WatchPaths {
    fn from(path: PathBuf) -> Self {
        Self::Single(path)
    }
}

impl From<&Path> for WatchPaths {
    fn from(path: &Path) -> Self {
        Self::Single(path.to_path_buf())
    }
}

impl From<&str> for WatchPaths {
    fn from(path: &str) -> Self {
        Self::Single(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for WatchPaths {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::Many(paths)
    }
}

impl From<&[PathBuf]> for WatchPaths {
    fn from(paths: &[PathBuf]) -> Self {
        Self::Many(paths.to_vec())
    }
}

/// Immutable directory -> file names map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRegistration {
    dirs: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl WatchRegistration {
    /// Build the registration, canonicalizing every directory
    ///
    /// Fails with `InvalidArgument` for an empty list, a path without a file
    /// name, a path that names a directory, or a parent directory that does
    /// not exist. The watched file itself does not need to exist yet.
    pub fn new(paths: impl Into<WatchPaths>) -> Result<Self> {
        let paths = match paths.into() {
            WatchPaths::Single(path) => vec![path],
            WatchPaths::Many(paths) => paths,
        };

        if paths.is_empty() {
            return Err(WatchError::InvalidArgument(
                "no paths to watch".to_string(),
            ));
        }

        let mut dirs: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        for path in &paths {
            let (dir, name) = split_watch_path(path)?;
            dirs.entry(dir).or_default().insert(name);
        }

        Ok(Self { dirs })
    }

    /// Directories to watch with the file names registered in each
    pub fn directories(&self) -> impl Iterator<Item = (&Path, &BTreeSet<String>)> {
        self.dirs.iter().map(|(dir, names)| (dir.as_path(), names))
    }

    /// Whether `filename` is registered inside `directory`
    pub fn contains(&self, directory: &Path, filename: &str) -> bool {
        self.dirs
            .get(directory)
            .is_some_and(|names| names.contains(filename))
    }

    /// Absolute paths of every watched file
    pub fn paths(&self) -> Vec<PathBuf> {
        self.dirs
            .iter()
            .flat_map(|(dir, names)| names.iter().map(move |name| dir.join(name)))
            .collect()
    }

    /// Number of watched files
    pub fn len(&self) -> usize {
        self.dirs.values().map(BTreeSet::len).sum()
    }

    /// Always false for a constructed registration
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}

/// Split a watch path into (canonical directory, file name)
fn split_watch_path(path: &Path) -> Result<(PathBuf, String)> {
    let invalid = |reason: &str| {
        WatchError::InvalidArgument(format!("{}: {}", path.display(), reason))
    };

    if path.is_dir() {
        return Err(invalid("is a directory, expected a file"));
    }

    let name = path
        .file_name()
        .ok_or_else(|| invalid("has no file name"))?
        .to_str()
        .ok_or_else(|| invalid("file name is not valid UTF-8"))?
        .to_string();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let dir = parent
        .canonicalize()
        .map_err(|e| invalid(&format!("cannot resolve directory: {}", e)))?;

    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_groups_files_by_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();

        let reg = WatchRegistration::new(vec![
            root.join("a.txt"),
            root.join("b.txt"),
            root.join("sub/c.txt"),
        ])
        .unwrap();

        let dirs: Vec<_> = reg.directories().map(|(d, n)| (d.to_path_buf(), n.len())).collect();
        assert_eq!(dirs, vec![(root.clone(), 2), (root.join("sub"), 1)]);
        assert_eq!(reg.len(), 3);
        assert!(reg.contains(&root, "a.txt"));
        assert!(reg.contains(&root.join("sub"), "c.txt"));
        assert!(!reg.contains(&root, "c.txt"));
    }

    #[test]
    fn test_relative_duplicates_collapse() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();

        let reg = WatchRegistration::new(vec![
            root.join("doc.md"),
            root.join("sub/../doc.md"),
            root.join("./doc.md"),
        ])
        .unwrap();

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.paths(), vec![root.join("doc.md")]);
    }

    #[test]
    fn test_single_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let reg = WatchRegistration::new(root.join("only.txt")).unwrap();
        assert_eq!(reg.paths(), vec![root.join("only.txt")]);
    }

    #[test]
    fn test_empty_list_is_invalid() {
        let err = WatchRegistration::new(Vec::<PathBuf>::new()).unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_directory_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let err = WatchRegistration::new(temp_dir.path()).unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_parent_is_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let err = WatchRegistration::new(temp_dir.path().join("missing/file.txt")).unwrap_err();
        assert!(err.to_string().contains("cannot resolve directory"));
    }

    #[test]
    fn test_root_has_no_file_name() {
        let err = WatchRegistration::new("/").unwrap_err();
        assert!(matches!(err, WatchError::InvalidArgument(_)));
    }
}
