//! Directory listings for chunks, blooms and derived caches.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::domain::errors::{IndexError, IoResultExt};
use crate::domain::range::FileRange;

/// Files directly inside `dir` with extension `ext`, sorted by name.
///
/// A missing directory lists as empty. Hidden files are skipped.
pub fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, IndexError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(IndexError::io(dir, e)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.at(dir)?;
        let path = entry.path();
        if is_hidden(&path) || !entry.file_type().at(&path)?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Chunk-like files in `dir` paired with their ranges.
///
/// Files whose names are not ranges are logged and left out.
pub fn list_ranges(dir: &Path, ext: &str) -> Result<Vec<(FileRange, PathBuf)>, IndexError> {
    let mut ranges = Vec::new();
    for path in list_files(dir, ext)? {
        match FileRange::from_filename(&path) {
            Ok(range) => ranges.push((range, path)),
            Err(err) => tracing::debug!(error = %err, "[chunk-index] skipping file"),
        }
    }
    ranges.sort();
    Ok(ranges)
}

/// Every regular file under `root`, skipping the directories in `exclude`.
pub fn walk_files(root: &Path, exclude: &[PathBuf]) -> Result<Vec<PathBuf>, IndexError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        if exclude.iter().any(|ex| ex == &dir) {
            continue;
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(IndexError::io(&dir, e)),
        };
        for entry in entries {
            let entry = entry.at(&dir)?;
            let path = entry.path();
            let kind = entry.file_type().at(&path)?;
            if kind.is_dir() {
                pending.push(path);
            } else if kind.is_file() && !is_hidden(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}
