//! # Durable Replace
//!
//! One primitive for every write that replaces index files:
//!
//! 1. back up each target into the tmp directory
//! 2. run the writer
//! 3. on success write the commit marker, then drop the backups and the
//!    marker; on failure restore the backups
//!
//! The commit marker is the single point where the write takes effect for
//! every target at once. A crash before it rolls all targets back; a crash
//! after it keeps all of them.
//!
//! A failed restore surfaces as `RestoreFailed` and must stop further
//! writes to the directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::backup::{
    commit_marker_for, remove_if_present, sync_parent, write_commit_marker, BackupFile,
};
use crate::domain::cancel::CancellationFlag;
use crate::domain::errors::{IndexError, IoResultExt};

/// Replace `targets` with whatever `writer` produces, or leave them as they
/// were.
///
/// `writer` receives the cancellation flag so it can check it between
/// steps. Cancellation before the backups are taken returns immediately;
/// after that it goes through the restore path like any other failure.
pub fn durable_replace<T, F>(
    tmp_dir: &Path,
    targets: &[&Path],
    cancel: &CancellationFlag,
    writer: F,
) -> Result<T, IndexError>
where
    F: FnOnce(&CancellationFlag) -> Result<T, IndexError>,
{
    cancel.checkpoint("backup")?;

    // A leftover marker would vouch for backups taken below.
    for target in targets {
        let marker = commit_marker_for(tmp_dir, target);
        if marker.exists() {
            return Err(IndexError::InconsistentBackup {
                path: target.to_path_buf(),
                backup: marker,
            });
        }
    }

    let mut backups = Vec::with_capacity(targets.len());
    for target in targets {
        match BackupFile::make(tmp_dir, target) {
            Ok(backup) => backups.push(backup),
            Err(err) => {
                // Nothing written yet: the copies are redundant.
                for backup in backups {
                    let _ = backup.clear();
                }
                return Err(err);
            }
        }
    }

    let result = writer(cancel).and_then(|value| {
        if targets.is_empty() {
            return Ok((value, None));
        }
        write_commit_marker(tmp_dir, targets).map(|marker| (value, Some(marker)))
    });

    match result {
        Ok((value, marker)) => {
            finish_commit(backups, marker);
            Ok(value)
        }
        Err(err) => {
            rollback(backups, &err)?;
            Err(err)
        }
    }
}

/// Drop the backups of a committed write, then its marker.
///
/// The write already took effect, so failures here are only logged. The
/// marker stays until every backup is gone and recovery discards whatever
/// is left.
fn finish_commit(backups: Vec<BackupFile>, marker: Option<PathBuf>) {
    for backup in backups {
        let saved = backup.saved_path().to_path_buf();
        if let Err(err) = backup.clear() {
            tracing::warn!(
                backup = %saved.display(),
                error = %err,
                "[chunk-index] committed write left a backup behind"
            );
            return;
        }
    }
    if let Some(marker) = marker {
        if let Err(err) = remove_if_present(&marker).and_then(|_| sync_parent(&marker)) {
            tracing::warn!(
                marker = %marker.display(),
                error = %err,
                "[chunk-index] commit marker left behind"
            );
        }
    }
}

fn rollback(backups: Vec<BackupFile>, cause: &IndexError) -> Result<(), IndexError> {
    let mut first_failure = None;
    for backup in backups.into_iter().rev() {
        let target = backup.target().to_path_buf();
        match backup.restore() {
            Ok(()) => tracing::warn!(
                path = %target.display(),
                error = %cause,
                "[chunk-index] write failed, previous file restored"
            ),
            Err(restore_err) => {
                tracing::error!(
                    path = %target.display(),
                    error = %restore_err,
                    cause = %cause,
                    "[chunk-index] restore failed"
                );
                first_failure.get_or_insert(restore_err);
            }
        }
    }
    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Write a whole file through a sibling temp file, sync it, then rename it
/// over `path`. Returns the number of bytes written.
pub fn write_synced<F>(path: &Path, fill: F) -> Result<u64, IndexError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), IndexError>,
{
    let partial = partial_path_for(path);
    let result = write_partial(&partial, fill).and_then(|len| {
        fs::rename(&partial, path).at(path)?;
        sync_parent(path).at(path)?;
        Ok(len)
    });
    if result.is_err() {
        let _ = remove_if_present(&partial);
    }
    result
}

fn write_partial<F>(partial: &Path, fill: F) -> Result<u64, IndexError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), IndexError>,
{
    let file = File::create(partial).at(partial)?;
    let mut writer = BufWriter::new(file);
    fill(&mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|e| IndexError::io(partial, e.into_error()))?;
    file.sync_all().at(partial)?;
    Ok(file.metadata().at(partial)?.len())
}

/// Overwrite `bytes` at `offset` in a copy of `path`, sync the copy, then
/// rename it over `path`. Readers see either the old file or the patched
/// one.
pub fn patch_synced(path: &Path, offset: u64, bytes: &[u8]) -> Result<(), IndexError> {
    let len = fs::metadata(path).at(path)?.len();
    if len < offset + bytes.len() as u64 {
        return Err(IndexError::corrupt(
            path,
            format!(
                "file is {} bytes, cannot patch {} bytes at offset {}",
                len,
                bytes.len(),
                offset
            ),
        ));
    }

    let partial = partial_path_for(path);
    let result = patch_partial(path, &partial, offset, bytes).and_then(|_| {
        fs::rename(&partial, path).at(path)?;
        sync_parent(path).at(path)
    });
    if result.is_err() {
        let _ = remove_if_present(&partial);
    }
    result
}

fn patch_partial(path: &Path, partial: &Path, offset: u64, bytes: &[u8]) -> Result<(), IndexError> {
    fs::copy(path, partial).at(partial)?;
    let mut file = OpenOptions::new().write(true).open(partial).at(partial)?;
    file.seek(SeekFrom::Start(offset)).at(partial)?;
    file.write_all(bytes).at(partial)?;
    file.sync_all().at(partial)
}

/// Hidden sibling used while a file is being written.
fn partial_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}
