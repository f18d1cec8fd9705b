//! User configuration
//!
//! Loaded from `<config_dir>/drivesync/config.toml`. Every key has a default,
//! so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use engine::PostPushPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use watcher::DebounceConfig;

/// Rejected configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("watch.poll_timeout_ms must be within 10-60000 (got {0})")]
    PollTimeout(u64),

    #[error("debounce.check_interval_ms must be greater than zero")]
    ZeroCheckInterval,

    #[error("debounce.check_interval_ms ({interval}) must be lower than debounce.cooldown_ms ({cooldown})")]
    CheckIntervalTooLong { interval: u64, cooldown: u64 },

    #[error("remote.mirror_root is required for the mirror backend")]
    MissingMirrorRoot,

    #[error("remote.fingerprint = \"content-and-modtime\" requires remote.post_push = \"requery-remote\"")]
    ModtimeWithoutRequery,

    #[error("no files to watch (set watch.paths or pass paths on the command line)")]
    NoPaths,
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch: WatchSettings,
    pub debounce: DebounceSettings,
    pub remote: RemoteSettings,
    pub notify: NotifySettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Files to keep in sync
    pub paths: Vec<PathBuf>,

    /// Upper bound on how long the watcher blocks before checking for stop
    pub poll_timeout_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            poll_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceSettings {
    pub enabled: bool,

    /// Quiet period after the last change of a file
    pub cooldown_ms: u64,

    /// How often pending changes are examined
    pub check_interval_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 3000,
            check_interval_ms: 50,
        }
    }
}

/// Which remote store backs the files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Drive through the `drive` command line client
    #[default]
    Drive,
    /// A directory tree, e.g. a mounted share
    Mirror,
}

/// What the drive backend reports as the remote version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteFingerprint {
    /// Content checksum only
    #[default]
    Content,
    /// Checksum plus the remote modification time
    ContentAndModtime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub backend: Backend,
    pub drive_command: String,
    pub mirror_root: Option<PathBuf>,

    /// Remote polling period; 0 disables polling
    pub poll_interval_secs: u64,
    pub post_push: PostPushPolicy,
    pub fingerprint: RemoteFingerprint,

    /// Time box for every remote call; 0 means unbounded
    pub call_timeout_secs: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Drive,
            drive_command: "drive".to_string(),
            mirror_root: None,
            poll_interval_secs: 300,
            post_push: PostPushPolicy::AssumeLocal,
            fingerprint: RemoteFingerprint::Content,
            call_timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    /// Send desktop notifications (otherwise they only go to the log)
    pub desktop: bool,
    pub app_name: String,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            desktop: true,
            app_name: "GDrive Sync".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,

    /// Also write the log to this file
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Check value ranges and cross-field constraints
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let poll = self.watch.poll_timeout_ms;
        if !(10..=60_000).contains(&poll) {
            return Err(ConfigError::PollTimeout(poll));
        }

        let debounce = &self.debounce;
        if debounce.check_interval_ms == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }
        if debounce.enabled && debounce.check_interval_ms >= debounce.cooldown_ms {
            return Err(ConfigError::CheckIntervalTooLong {
                interval: debounce.check_interval_ms,
                cooldown: debounce.cooldown_ms,
            });
        }

        let remote = &self.remote;
        if remote.backend == Backend::Mirror && remote.mirror_root.is_none() {
            return Err(ConfigError::MissingMirrorRoot);
        }
        if remote.fingerprint == RemoteFingerprint::ContentAndModtime
            && remote.post_push != PostPushPolicy::RequeryRemote
        {
            return Err(ConfigError::ModtimeWithoutRequery);
        }

        Ok(())
    }

    /// `validate` plus the checks that only matter when files are watched
    pub fn validate_for_watch(&self) -> std::result::Result<(), ConfigError> {
        self.validate()?;
        if self.watch.paths.is_empty() {
            return Err(ConfigError::NoPaths);
        }
        Ok(())
    }

    /// Append command line paths to the configured ones
    pub fn with_extra_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        for path in paths {
            if !self.watch.paths.contains(&path) {
                self.watch.paths.push(path);
            }
        }
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.watch.poll_timeout_ms)
    }

    pub fn debounce_config(&self) -> DebounceConfig {
        DebounceConfig::new(Duration::from_millis(self.debounce.cooldown_ms))
            .with_check_interval(Duration::from_millis(self.debounce.check_interval_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.remote.poll_interval_secs)
    }

    /// Per-call oracle time box, if any
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.remote.call_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Default config file location
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("drivesync").join("config.toml"))
}

/// Directory for runtime state (the instance lock)
pub fn state_dir() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("drivesync"))
}

/// Load from the default location; a missing file yields the defaults
pub fn load() -> Result<Config> {
    match config_file_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(Config::default()),
    }
}

/// Load and validate a specific file
pub fn load_from(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Write the example config to the default location unless a file exists.
/// Returns the path.
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    write_example_if_missing(&path)?;
    Ok(path)
}

fn write_example_if_missing(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, example_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Commented configuration showing every key with its default
pub fn example_config() -> &'static str {
    r#"# drivesync configuration

[watch]
# Files to keep in sync (absolute paths recommended)
paths = []
# Upper bound on how long the watcher blocks before checking for stop (10-60000)
poll_timeout_ms = 1000

[debounce]
# Wait for a quiet period before checking a changed file
enabled = true
cooldown_ms = 3000
check_interval_ms = 50

[remote]
# "drive" (the drive command line client) or "mirror" (a directory tree)
backend = "drive"
drive_command = "drive"
# mirror_root = "/mnt/share"
# Seconds between remote polls (0 disables polling)
poll_interval_secs = 300
# Version remembered after a push: "assume-local" or "requery-remote"
post_push = "assume-local"
# Remote version for the drive backend: "content" or "content-and-modtime"
fingerprint = "content"
# Time box for each remote call in seconds (0 = unbounded)
call_timeout_secs = 0

[notify]
desktop = true
app_name = "GDrive Sync"

[log]
# Used when RUST_LOG is not set
level = "info"
# file = "/var/log/drivesync.log"
"#
}
