//! Content fingerprints
//!
//! A fingerprint is an opaque content digest, optionally qualified by a
//! revision marker (a remote modification time, say). Two fingerprints hold
//! the same content when their digests match; they are the same version only
//! when the revisions match too. The helpers here produce BLAKE3 hex digests
//! of local content.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

/// Opaque version identifier of one side of a synchronized file
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    content: String,
    revision: Option<String>,
}

impl Fingerprint {
    /// Wrap an already computed content digest
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            revision: None,
        }
    }

    /// Qualify the digest with a revision marker
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Fingerprint of in-memory content
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::new(blake3::hash(data).to_hex().to_string())
    }

    /// Fingerprint of a file (streaming)
    pub fn of_file(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut hasher = blake3::Hasher::new();

        let mut buffer = [0u8; 8192];
        loop {
            let n = reader
                .read(&mut buffer)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(Self::new(hasher.finalize().to_hex().to_string()))
    }

    /// Fingerprint a file that may still be written to
    ///
    /// Stats the file before and after hashing and only accepts the digest if
    /// size and mtime did not move. Retries with exponential backoff (50ms,
    /// 100ms, ...) up to `max_retries` attempts.
    pub fn of_file_stable(path: &Path, max_retries: u8) -> Result<Self> {
        for attempt in 0..max_retries {
            let before = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat (pre): {}", path.display()))?;
            let fingerprint = Self::of_file(path)?;
            let after = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat (post): {}", path.display()))?;

            if before.len() == after.len() && before.modified()? == after.modified()? {
                return Ok(fingerprint);
            }

            if attempt + 1 < max_retries {
                sleep(Duration::from_millis(50 << attempt));
            }
        }

        anyhow::bail!(
            "File {} is unstable after {} read attempts (file changing too rapidly)",
            path.display(),
            max_retries
        )
    }

    /// The content digest
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// The revision marker, if the source reports one
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Whether both sides hold the same content, whatever their revisions
    pub fn same_content(&self, other: &Fingerprint) -> bool {
        self.content == other.content
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}@{}", self.content, revision),
            None => f.write_str(&self.content),
        }
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
