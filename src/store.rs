//! On-disk backup layout.
//!
//! ```text
//! <root>/
//!   fw1.example.com/
//!     fw1.example.com-20240131-235959.xml
//!     fw1.example.com-20240131-235959-1.xml   (second upload in the same second)
//!   edge01/
//!     edge01-20240201-080000.xml
//! ```
//!
//! Hostnames come from uploaded documents, so they are validated before they
//! touch a path. Files are never overwritten: a name collision within one
//! second gets a numeric suffix.

use chrono::{DateTime, Local};
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{IntakeError, Result};
use crate::models::BackupRecord;

/// `strftime` pattern for the timestamp embedded in file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;
const MAX_HOSTNAME_LEN: usize = 253;
/// Collision suffixes tried before giving up on a timestamp.
const MAX_SUFFIX: u32 = 999;

/// Writes backups under a fixed root directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds every backup of `hostname`.
    pub fn host_dir(&self, hostname: &str) -> Result<PathBuf> {
        validate_hostname(hostname)?;
        let dir = self.root.join(hostname);
        if dir.parent() != Some(self.root.as_path())
            || dir.file_name().and_then(|n| n.to_str()) != Some(hostname)
        {
            return Err(IntakeError::InvalidHostname(hostname.to_string()));
        }
        Ok(dir)
    }

    /// Creates the host directory and any missing ancestors. Succeeds if it
    /// already exists.
    pub fn ensure_host_dir(&self, hostname: &str) -> Result<PathBuf> {
        let dir = self.host_dir(hostname)?;
        dir_builder()
            .create(&dir)
            .map_err(|source| IntakeError::DirectoryCreateFailed {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    /// Stores `content` as a new backup of `hostname`, timestamped now.
    pub fn save(&self, hostname: &str, content: &[u8]) -> Result<BackupRecord> {
        self.save_at(hostname, content, Local::now())
    }

    /// Stores `content` as a new backup of `hostname` taken at `now`.
    ///
    /// The bytes are synced to the filesystem before this returns.
    pub fn save_at(
        &self,
        hostname: &str,
        content: &[u8],
        now: DateTime<Local>,
    ) -> Result<BackupRecord> {
        let dir = self.ensure_host_dir(hostname)?;
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();

        let (path, mut file) = create_unique(&dir, hostname, &stamp)?;

        if let Err(source) = write_synced(&mut file, content) {
            discard_partial(file, &path);
            return Err(IntakeError::WriteFailed { path, source });
        }

        Ok(BackupRecord {
            hostname: hostname.to_string(),
            path,
            size: content.len() as u64,
            created_at: now,
        })
    }
}

/// Rejects anything that is not a plain DNS-style name, so a hostname can
/// never name a parent directory, an absolute path, or a hidden file.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    let ok = !hostname.is_empty()
        && hostname.len() <= MAX_HOSTNAME_LEN
        && !hostname.starts_with('.')
        && !hostname.contains("..")
        && hostname
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'));
    if ok {
        Ok(())
    } else {
        Err(IntakeError::InvalidHostname(hostname.to_string()))
    }
}

/// `<hostname>-<stamp>.xml`, or `<hostname>-<stamp>-<n>.xml` for `n > 0`.
pub fn backup_file_name(hostname: &str, stamp: &str, suffix: u32) -> String {
    if suffix == 0 {
        format!("{}-{}.xml", hostname, stamp)
    } else {
        format!("{}-{}-{}.xml", hostname, stamp, suffix)
    }
}

fn create_unique(dir: &Path, hostname: &str, stamp: &str) -> Result<(PathBuf, File)> {
    for suffix in 0..=MAX_SUFFIX {
        let path = dir.join(backup_file_name(hostname, stamp, suffix));
        match open_options().open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(IntakeError::WriteFailed { path, source }),
        }
    }
    Err(IntakeError::WriteFailed {
        path: dir.join(backup_file_name(hostname, stamp, MAX_SUFFIX)),
        source: io::Error::new(
            io::ErrorKind::AlreadyExists,
            "too many backups with the same timestamp",
        ),
    })
}

fn write_synced(file: &mut File, content: &[u8]) -> io::Result<()> {
    file.write_all(content)?;
    file.sync_all()
}

/// Closes and removes a backup whose write did not complete.
fn discard_partial(file: File, path: &Path) {
    drop(file);
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not remove partial backup");
    }
}

fn dir_builder() -> DirBuilder {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
}

fn open_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options
}
