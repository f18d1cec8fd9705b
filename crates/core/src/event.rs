//! Normalized change events

use std::hash::Hash;
use std::path::{Path, PathBuf};

/// A change observed on one watched file
///
/// Events are immutable and passed by value through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the changed file
    pub path: PathBuf,
    /// File name inside `directory`
    pub filename: String,
    /// Canonical directory that holds the file
    pub directory: PathBuf,
}

impl ChangeEvent {
    /// Build an event for `filename` inside `directory`
    pub fn new(directory: &Path, filename: &str) -> Self {
        Self {
            path: directory.join(filename),
            filename: filename.to_string(),
            directory: directory.to_path_buf(),
        }
    }
}

/// Payloads that belong to a logical source and can be coalesced per source
pub trait Keyed {
    /// Identity of the logical source
    type Key: Eq + Hash + Clone + Send + 'static;

    /// Source this payload belongs to
    fn key(&self) -> Self::Key;
}

impl Keyed for ChangeEvent {
    type Key = PathBuf;

    fn key(&self) -> PathBuf {
        self.path.clone()
    }
}
