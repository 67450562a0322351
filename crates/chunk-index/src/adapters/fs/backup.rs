//! # Backup Files
//!
//! Copies of files about to be replaced, kept in the chain's tmp directory
//! until the replacement is durable.
//!
//! ```text
//! <tmp>/<name>.backup    copy of an existing target
//! <tmp>/<name>.created   marker: target did not exist before the write
//! <tmp>/<name>.commit    the write finished; lists every target it covered
//! ```
//!
//! A `.created` marker lets recovery remove a half-written file after a
//! crash even though there is nothing to put back. A `.commit` marker is
//! written once all targets are in place and removed after the backups
//! are gone; while it exists, backups of the targets it lists are stale.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::domain::errors::{IndexError, IoResultExt};

/// Extension appended to backup copies.
pub const BACKUP_EXT: &str = "backup";

/// Extension appended to "no previous file" markers.
pub const CREATED_EXT: &str = "created";

/// Extension of the marker that closes a multi-file write.
pub const COMMIT_EXT: &str = "commit";

/// Where the backup of `target` lives in `tmp_dir`.
pub fn backup_path_for(tmp_dir: &Path, target: &Path) -> PathBuf {
    tmp_dir.join(suffixed_name(target, BACKUP_EXT))
}

/// Where the "no previous file" marker of `target` lives in `tmp_dir`.
pub fn created_marker_for(tmp_dir: &Path, target: &Path) -> PathBuf {
    tmp_dir.join(suffixed_name(target, CREATED_EXT))
}

/// Where the commit marker of a write led by `target` lives in `tmp_dir`.
pub fn commit_marker_for(tmp_dir: &Path, target: &Path) -> PathBuf {
    tmp_dir.join(suffixed_name(target, COMMIT_EXT))
}

/// Record that every one of `targets` now holds its new contents.
///
/// The marker is named after the first target and lists the file name of
/// each target on its own line.
pub fn write_commit_marker(tmp_dir: &Path, targets: &[&Path]) -> Result<PathBuf, IndexError> {
    let Some(first) = targets.first() else {
        return Err(IndexError::io(
            tmp_dir,
            io::Error::new(io::ErrorKind::InvalidInput, "commit without targets"),
        ));
    };
    let marker = commit_marker_for(tmp_dir, first);
    let mut body = String::new();
    for target in targets {
        if let Some(name) = target.file_name() {
            body.push_str(&name.to_string_lossy());
            body.push('\n');
        }
    }

    let mut file = File::create(&marker).at(&marker)?;
    file.write_all(body.as_bytes()).at(&marker)?;
    file.sync_all().at(&marker)?;
    sync_parent(&marker).at(&marker)?;
    Ok(marker)
}

/// File names listed by a commit marker.
pub fn read_commit_marker(marker: &Path) -> Result<Vec<String>, IndexError> {
    let body = fs::read_to_string(marker).at(marker)?;
    Ok(body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

fn suffixed_name(target: &Path, ext: &str) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}.{}", name, ext)
}

/// A saved copy of one target, or a marker that it did not exist.
#[derive(Debug)]
pub struct BackupFile {
    target: PathBuf,
    saved: PathBuf,
    existed: bool,
}

impl BackupFile {
    /// Save `target` into `tmp_dir` before it is overwritten.
    ///
    /// ## Errors
    ///
    /// - `InconsistentBackup`: a backup or marker for `target` already exists
    /// - `Io`: the copy or marker could not be written and synced
    pub fn make(tmp_dir: &Path, target: &Path) -> Result<Self, IndexError> {
        if target.file_name().is_none() {
            return Err(IndexError::io(
                target,
                io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"),
            ));
        }

        let backup = backup_path_for(tmp_dir, target);
        let marker = created_marker_for(tmp_dir, target);
        for stale in [&backup, &marker] {
            if stale.exists() {
                return Err(IndexError::InconsistentBackup {
                    path: target.to_path_buf(),
                    backup: stale.clone(),
                });
            }
        }

        fs::create_dir_all(tmp_dir).at(tmp_dir)?;

        match fs::metadata(target) {
            Ok(_) => {
                if let Err(e) = copy_synced(target, &backup) {
                    let _ = fs::remove_file(&backup);
                    return Err(IndexError::io(&backup, e));
                }
                Ok(Self {
                    target: target.to_path_buf(),
                    saved: backup,
                    existed: true,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let file = File::create(&marker).at(&marker)?;
                file.sync_all().at(&marker)?;
                Ok(Self {
                    target: target.to_path_buf(),
                    saved: marker,
                    existed: false,
                })
            }
            Err(e) => Err(IndexError::io(target, e)),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The backup copy, or the marker when the target did not exist.
    pub fn saved_path(&self) -> &Path {
        &self.saved
    }

    /// True when there was a file to back up.
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Put the target back the way it was before the write.
    ///
    /// ## Errors
    ///
    /// `RestoreFailed` when the original could not be put back or the new
    /// file could not be removed.
    pub fn restore(self) -> Result<(), IndexError> {
        let failed = |source| IndexError::RestoreFailed {
            path: self.target.clone(),
            source,
        };

        if self.existed {
            move_file(&self.saved, &self.target).map_err(failed)?;
        } else {
            remove_if_present(&self.target).map_err(failed)?;
            remove_if_present(&self.saved).map_err(failed)?;
        }
        sync_parent(&self.target).map_err(failed)?;
        Ok(())
    }

    /// Drop the backup once the replacement is durable.
    pub fn clear(self) -> Result<(), IndexError> {
        remove_if_present(&self.saved).at(&self.saved)?;
        sync_parent(&self.saved).at(&self.saved)
    }
}

/// Put `backup` back at `target`, as recovery does after a crash.
pub fn restore_from(backup: &Path, target: &Path) -> Result<(), IndexError> {
    move_file(backup, target)
        .and_then(|_| sync_parent(target))
        .map_err(|source| IndexError::RestoreFailed {
            path: target.to_path_buf(),
            source,
        })
}

/// Rename, falling back to copy + sync + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_synced(from, to)?;
    fs::remove_file(from)
}

pub(crate) fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn copy_synced(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    let mut file = OpenOptions::new().write(true).open(to)?;
    file.flush()?;
    file.sync_all()
}

/// Make a rename or unlink in `path`'s directory durable.
pub(crate) fn sync_parent(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
