//! Single-instance lock
//!
//! Two watchers pushing the same files would race each other's pushes, so
//! `dsync watch` holds an exclusive `flock` for its whole lifetime.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Held lock; released when dropped
///
/// The lock file itself is never unlinked. The `flock` on its inode is the
/// lock; the pid inside is only for error messages.
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
}

impl InstanceLock {
    /// Take the lock in `state_dir`
    ///
    /// Fails whenever another process holds the `flock`. The kernel drops the
    /// lock when its holder exits, so a file left behind by a dead process
    /// is simply locked again.
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join("watch.lock");
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create {}", state_dir.display()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if !try_flock_exclusive(&file)? {
            // The holder may not have written its pid yet
            let holder = match read_lock_content(&mut file) {
                Ok(content) => format!("pid {}", content.pid),
                Err(_) => "pid unknown".to_string(),
            };
            anyhow::bail!(
                "Another dsync watch is running ({}, lock {})",
                holder,
                path.display()
            );
        }

        write_lock_content(&mut file)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Clear our pid; closing the file releases the flock
        let _ = self.file.set_len(0);
    }
}

fn write_lock_content(file: &mut File) -> Result<()> {
    let content = LockContent {
        pid: std::process::id(),
        started_at: current_timestamp_ms(),
    };
    let serialized = serde_json::to_string(&content).context("Failed to serialize lock content")?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn read_lock_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).context("Failed to deserialize lock content")
}

/// Non-blocking exclusive lock; false when someone else holds it
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
