//! # Recovery
//!
//! Settles what an interrupted write left behind, range by range:
//!
//! - `<tmp>/X.bin.commit` lists the targets of a write that finished; their
//!   backups and markers are stale and are discarded
//! - `<tmp>/X.bin.backup` / `X.bloom.backup` are moved back over the target
//! - `<tmp>/X.bin.created` / `X.bloom.created` mean the target is new and is
//!   removed
//! - a bloom backup or marker with no chunk counterpart is discarded: chunk
//!   and bloom are written together with the chunk backed up first, so the
//!   chunk entry is only missing once the write committed; a bloom-only
//!   retag replaces the file atomically, so either version is whole
//! - hidden `.X.partial` files beside chunks and blooms are removed
//!
//! Ranges with a write in flight are left alone.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::ChunkIndexService;
use crate::adapters::fs::backup::{
    read_commit_marker, remove_if_present, restore_from, sync_parent, BACKUP_EXT, COMMIT_EXT,
    CREATED_EXT,
};
use crate::domain::errors::{IndexError, IoResultExt};
use crate::domain::range::FileRange;
use crate::domain::report::RecoveryReport;
use crate::ports::outbound::{PathResolver, BLOOM_EXT, CHUNK_EXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SavedKind {
    Backup,
    Created,
    Commit,
}

/// One file found in the tmp directory.
struct SavedEntry {
    saved: PathBuf,
    target: PathBuf,
    range: FileRange,
    kind: SavedKind,
    /// The target is a chunk rather than a bloom.
    chunk: bool,
}

impl<P: PathResolver> ChunkIndexService<P> {
    /// Recover every range that has no write in flight.
    pub(crate) fn recover_all(&self) -> Result<RecoveryReport, IndexError> {
        let mut report = RecoveryReport::new();

        let mut by_range: BTreeMap<FileRange, Vec<SavedEntry>> = BTreeMap::new();
        for saved in self.saved_files()? {
            match self.classify(&saved) {
                Some(entry) => by_range.entry(entry.range).or_default().push(entry),
                None => report.add_orphan(saved),
            }
        }

        for (range, entries) in by_range {
            let handle = self.ranges.handle(range);
            let Some(_guard) = handle.try_lock() else {
                tracing::debug!(range = %range, "[chunk-index] write in flight, not recovering");
                continue;
            };
            self.recover_entries(&entries, &mut report);
        }

        for dir in [self.index_dir(), self.bloom_dir()] {
            self.sweep_partials(&dir)?;
        }
        self.ranges.prune();

        self.finish_recovery(&report);
        Ok(report)
    }

    /// Recover one range. The caller must hold the range's lock.
    ///
    /// ## Errors
    ///
    /// `RestoreFailed` when any backup of the range could not be settled.
    pub(crate) fn recover_range(&self, range: &FileRange) -> Result<RecoveryReport, IndexError> {
        let mut report = RecoveryReport::new();
        let entries: Vec<SavedEntry> = self
            .saved_files()?
            .iter()
            .filter_map(|saved| self.classify(saved))
            .filter(|e| e.range == *range)
            .collect();
        self.recover_entries(&entries, &mut report);
        self.finish_recovery(&report);

        if let Some(failure) = report.failures.first() {
            return Err(IndexError::RestoreFailed {
                path: failure.target.clone(),
                source: io::Error::new(io::ErrorKind::Other, failure.reason.clone()),
            });
        }
        Ok(report)
    }

    fn finish_recovery(&self, report: &RecoveryReport) {
        self.metrics.record_restores(report.restored.len() as u64);
        for target in &report.restored {
            tracing::warn!(path = %target.display(), "[chunk-index] restored from backup");
        }
        if let Some(failure) = report.failures.first() {
            self.quarantine(&format!(
                "restoring {} from {} failed: {}",
                failure.target.display(),
                failure.backup.display(),
                failure.reason
            ));
        }
    }

    /// Settle every entry of one range.
    fn recover_entries(&self, entries: &[SavedEntry], report: &mut RecoveryReport) {
        let failures_before = report.failures.len();

        let mut committed = HashSet::new();
        for marker in entries.iter().filter(|e| e.kind == SavedKind::Commit) {
            match read_commit_marker(&marker.saved) {
                Ok(names) => committed.extend(names),
                Err(err) => {
                    // Without the list nothing in the range can be trusted.
                    let reason = err.to_string();
                    report.add_failure(marker.saved.clone(), marker.target.clone(), reason);
                    return;
                }
            }
        }
        let is_committed = |entry: &SavedEntry| {
            entry
                .target
                .file_name()
                .map_or(false, |name| committed.contains(&*name.to_string_lossy()))
        };

        let chunk_pending = entries
            .iter()
            .any(|e| e.chunk && e.kind != SavedKind::Commit && !is_committed(e));

        for entry in entries.iter().filter(|e| e.kind != SavedKind::Commit) {
            if is_committed(entry) || (!entry.chunk && !chunk_pending) {
                self.discard_entry(entry, report);
            } else {
                self.recover_entry(entry, report);
            }
        }

        if report.failures.len() > failures_before {
            return;
        }
        for marker in entries.iter().filter(|e| e.kind == SavedKind::Commit) {
            let removed = remove_if_present(&marker.saved).and_then(|_| sync_parent(&marker.saved));
            if let Err(err) = removed {
                report.add_failure(marker.saved.clone(), marker.target.clone(), err.to_string());
            }
        }
    }

    fn recover_entry(&self, entry: &SavedEntry, report: &mut RecoveryReport) {
        let result = if entry.kind == SavedKind::Created {
            remove_if_present(&entry.target)
                .and_then(|_| remove_if_present(&entry.saved))
                .and_then(|_| sync_parent(&entry.target))
                .map_err(|source| IndexError::RestoreFailed {
                    path: entry.target.clone(),
                    source,
                })
        } else {
            restore_from(&entry.saved, &entry.target)
        };

        match result {
            Ok(()) => report.add_restored(entry.target.clone()),
            Err(err) => {
                tracing::error!(
                    backup = %entry.saved.display(),
                    error = %err,
                    "[chunk-index] recovery failed"
                );
                report.add_failure(entry.saved.clone(), entry.target.clone(), err.to_string());
            }
        }
    }

    /// Drop a backup or marker whose target already holds a whole write.
    fn discard_entry(&self, entry: &SavedEntry, report: &mut RecoveryReport) {
        match remove_if_present(&entry.saved).and_then(|_| sync_parent(&entry.saved)) {
            Ok(()) => {
                tracing::info!(
                    backup = %entry.saved.display(),
                    path = %entry.target.display(),
                    "[chunk-index] write had committed, discarded its backup"
                );
                report.add_discarded(entry.saved.clone());
            }
            Err(err) => {
                report.add_failure(entry.saved.clone(), entry.target.clone(), err.to_string());
            }
        }
    }

    /// Backups and markers currently in the tmp directory.
    fn saved_files(&self) -> Result<Vec<PathBuf>, IndexError> {
        let tmp = self.tmp_dir();
        let entries = match fs::read_dir(&tmp) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IndexError::io(&tmp, e)),
        };

        let mut saved = Vec::new();
        for entry in entries {
            let path = entry.at(&tmp)?.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if matches!(ext, Some(BACKUP_EXT) | Some(CREATED_EXT) | Some(COMMIT_EXT)) {
                saved.push(path);
            }
        }
        saved.sort();
        Ok(saved)
    }

    /// Map `X.bin.backup` to `finalized/X.bin`, `X.bloom.created` to
    /// `blooms/X.bloom`, and so on.
    fn classify(&self, saved: &Path) -> Option<SavedEntry> {
        let kind = match saved.extension()?.to_str()? {
            BACKUP_EXT => SavedKind::Backup,
            CREATED_EXT => SavedKind::Created,
            COMMIT_EXT => SavedKind::Commit,
            _ => return None,
        };
        let inner = Path::new(saved.file_stem()?);
        let range = FileRange::from_filename(inner).ok()?;
        let (dir, chunk) = match inner.extension()?.to_str()? {
            CHUNK_EXT => (self.index_dir(), true),
            BLOOM_EXT => (self.bloom_dir(), false),
            _ => return None,
        };
        Some(SavedEntry {
            saved: saved.to_path_buf(),
            target: dir.join(inner),
            range,
            kind,
            chunk,
        })
    }

    /// Remove `.X.partial` files whose range has no write in flight.
    fn sweep_partials(&self, dir: &Path) -> Result<(), IndexError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(IndexError::io(dir, e)),
        };

        for entry in entries {
            let path = entry.at(dir)?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name
                .strip_prefix('.')
                .and_then(|n| n.strip_suffix(".partial"))
            else {
                continue;
            };
            let Ok(range) = FileRange::from_filename(stem) else {
                continue;
            };
            let handle = self.ranges.handle(range);
            if let Some(_guard) = handle.try_lock() {
                tracing::debug!(path = %path.display(), "[chunk-index] removing partial file");
                remove_if_present(&path).at(&path)?;
            };
        }
        Ok(())
    }
}
