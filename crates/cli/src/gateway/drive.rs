//! Google Drive through the `drive` command line client

use crate::config::RemoteFingerprint;
use engine::{OracleError, VersionOracle};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use sync_core::Fingerprint;
use tracing::{debug, warn};

/// Gateway that shells out to `drive stat` and `drive push`
#[derive(Debug, Clone)]
pub struct DriveGateway {
    command: String,
    fingerprint: RemoteFingerprint,
}

impl DriveGateway {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fingerprint: RemoteFingerprint::Content,
        }
    }

    /// Choose what the remote fingerprint is made of
    pub fn with_fingerprint(mut self, fingerprint: RemoteFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Run `drive <args> <path>` from the file's directory, feeding `stdin`
    fn run(&self, args: &[&str], path: &Path, stdin: Option<&[u8]>) -> Result<Output, OracleError> {
        let io_error = |source: io::Error| OracleError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut command = Command::new(&self.command);
        command
            .args(args)
            .arg(path)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = path.parent().filter(|d| d.is_dir()) {
            command.current_dir(dir);
        }

        debug!(command = %self.command, ?args, path = %path.display(), "Running drive");
        let mut child = command.spawn().map_err(io_error)?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // The client may exit without reading the confirmation
            if let Err(e) = pipe.write_all(input) {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(io_error(e));
                }
            }
        }

        let output = child.wait_with_output().map_err(io_error)?;
        if !output.status.success() {
            return Err(OracleError::Command {
                command: format!("{} {} {}", self.command, args.join(" "), path.display()),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl VersionOracle for DriveGateway {
    fn local_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        md5_of_file(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn remote_fingerprint(&self, path: &Path) -> Result<Fingerprint, OracleError> {
        let output = self.run(&["stat"], path, None)?;
        parse_stat(&String::from_utf8_lossy(&output.stdout), self.fingerprint)
    }

    fn push(&self, path: &Path, force: bool) -> Result<(), OracleError> {
        let args: &[&str] = if force { &["push", "-force"] } else { &["push"] };
        let output = self.run(args, path, Some(b"y\n"))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(path = %path.display(), "drive push reported: {}", stderr.trim());
        }
        Ok(())
    }
}

/// MD5 hex digest of a file, the checksum Drive reports for its copy
pub fn md5_of_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(Fingerprint::new(hex::encode(hasher.finalize())))
}

/// Extract the remote fingerprint from `drive stat` output
///
/// The checksum is the last token of the first line whose key starts with
/// `Md5`; the modification time is everything after the `ModTime` key and
/// becomes the fingerprint's revision under `ContentAndModtime`.
pub fn parse_stat(output: &str, policy: RemoteFingerprint) -> Result<Fingerprint, OracleError> {
    let mut checksum = None;
    let mut mod_time = None;

    for line in output.lines().map(str::trim) {
        let Some((key, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        if checksum.is_none() && key.starts_with("Md5") {
            checksum = rest.split_whitespace().last();
        } else if mod_time.is_none() && key == "ModTime" {
            mod_time = Some(rest.trim());
        }
    }

    let checksum = checksum
        .ok_or_else(|| OracleError::Parse("no Md5 line in `drive stat` output".to_string()))?;

    match policy {
        RemoteFingerprint::Content => Ok(Fingerprint::new(checksum)),
        RemoteFingerprint::ContentAndModtime => {
            let mod_time = mod_time.ok_or_else(|| {
                OracleError::Parse("no ModTime line in `drive stat` output".to_string())
            })?;
            Ok(Fingerprint::new(checksum).with_revision(mod_time))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STAT: &str = "\
/Documents/notes.txt
  Filename      notes.txt
  FileId        0B2Lk2zLzA1yX
  Bytes         1.03KB
  DirType       file
  MimeType      text/plain
  ModTime       2016-02-04 05:17:52 +0000 UTC
  Md5Checksum   9e107d9d372bb6826bd81d3542a419d6
";

    #[test]
    fn test_parse_stat_content() {
        let fp = parse_stat(STAT, RemoteFingerprint::Content).unwrap();
        assert_eq!(fp.as_str(), "9e107d9d372bb6826bd81d3542a419d6");
    }

    #[test]
    fn test_parse_stat_with_modtime() {
        let fp = parse_stat(STAT, RemoteFingerprint::ContentAndModtime).unwrap();
        assert_eq!(fp.as_str(), "9e107d9d372bb6826bd81d3542a419d6");
        assert_eq!(fp.revision(), Some("2016-02-04 05:17:52 +0000 UTC"));
        assert!(fp.same_content(&parse_stat(STAT, RemoteFingerprint::Content).unwrap()));
    }

    #[test]
    fn test_parse_stat_without_checksum() {
        let err = parse_stat("  Filename  notes.txt\n", RemoteFingerprint::Content).unwrap_err();
        assert!(matches!(err, OracleError::Parse(_)));
    }

    #[test]
    fn test_md5_of_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fox.txt");
        std::fs::write(&path, b"The quick brown fox jumps over the lazy dog").unwrap();

        assert_eq!(
            md5_of_file(&path).unwrap().as_str(),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn test_local_matches_remote_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fox.txt");
        std::fs::write(&path, b"The quick brown fox jumps over the lazy dog").unwrap();

        let gateway = DriveGateway::new("drive");
        assert_eq!(
            gateway.local_fingerprint(&path).unwrap(),
            parse_stat(STAT, RemoteFingerprint::Content).unwrap()
        );
    }

    #[test]
    fn test_missing_client_is_an_io_error() {
        let gateway = DriveGateway::new("drivesync-test-no-such-binary");
        let err = gateway
            .remote_fingerprint(Path::new("/tmp/notes.txt"))
            .unwrap_err();
        assert!(matches!(err, OracleError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_client_is_a_command_error() {
        let gateway = DriveGateway::new("false");
        let err = gateway.push(Path::new("/tmp/notes.txt"), true).unwrap_err();
        assert!(matches!(err, OracleError::Command { .. }));
    }

    /// Stand-in `drive` client backed by a directory; every push bumps the
    /// remote modification time
    #[cfg(target_os = "linux")]
    fn fake_drive(dir: &Path, remote: &Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("drive");
        let body = format!(
            r#"#!/bin/sh
remote="{}"
for target; do :; done
name=$(basename "$target")
case "$1" in
  stat)
    echo "/$name"
    echo "  ModTime       $(cat "$remote/$name.mtime")"
    echo "  Md5Checksum   $(md5sum "$remote/$name" | cut -d' ' -f1)"
    ;;
  push)
    cat > /dev/null
    cp "$target" "$remote/$name"
    n=$(cat "$remote/$name.mtime")
    echo $((n + 1)) > "$remote/$name.mtime"
    ;;
esac
"#,
            remote.display()
        );
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_modtime_fingerprint_reaches_synchronized() {
        use engine::{LogNotifier, Outcome, PostPushPolicy, SyncEngine, SyncState};
        use std::sync::Arc;

        let temp_dir = TempDir::new().unwrap();
        let local_dir = temp_dir.path().join("local");
        let remote_dir = temp_dir.path().join("remote");
        std::fs::create_dir_all(&local_dir).unwrap();
        std::fs::create_dir_all(&remote_dir).unwrap();
        let script = fake_drive(temp_dir.path(), &remote_dir);

        let path = local_dir.join("notes.txt");
        std::fs::write(&path, "v1").unwrap();
        std::fs::write(remote_dir.join("notes.txt"), "v1").unwrap();
        std::fs::write(remote_dir.join("notes.txt.mtime"), "1\n").unwrap();

        let gateway = DriveGateway::new(script.to_string_lossy())
            .with_fingerprint(RemoteFingerprint::ContentAndModtime);
        let engine = SyncEngine::new(&path, Arc::new(gateway), Arc::new(LogNotifier))
            .with_post_push(PostPushPolicy::RequeryRemote);

        assert_eq!(engine.handle_change().unwrap(), Outcome::Resumed);
        assert_eq!(engine.state(), SyncState::Synchronized);

        std::fs::write(&path, "v2").unwrap();
        assert_eq!(engine.handle_change().unwrap(), Outcome::Pushed);
        assert_eq!(std::fs::read_to_string(remote_dir.join("notes.txt")).unwrap(), "v2");
        let remembered = engine.snapshot().last_known_remote.unwrap();
        assert_eq!(remembered.revision(), Some("2"));
        assert_eq!(engine.handle_change().unwrap(), Outcome::Unchanged);

        // Edited on another machine, then locally
        std::fs::write(remote_dir.join("notes.txt"), "v3").unwrap();
        std::fs::write(remote_dir.join("notes.txt.mtime"), "3\n").unwrap();
        std::fs::write(&path, "v4").unwrap();
        assert_eq!(engine.handle_change().unwrap(), Outcome::Conflict);
        assert_eq!(std::fs::read_to_string(remote_dir.join("notes.txt")).unwrap(), "v3");
    }
}
