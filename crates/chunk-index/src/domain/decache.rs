//! # Decache Planning
//!
//! Decides which chunk, bloom and derived-cache files cover invalidated
//! block ranges. Planning is pure: it works over a listing and never touches
//! the filesystem. Deletion is `DecachePlan::execute`.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::range::{FileRange, RANGE_DIGITS};

/// What kind of file a listed entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntryKind {
    /// `finalized/<range>.bin`
    Chunk,
    /// `blooms/<range>.bloom`
    Bloom,
    /// A derived cache item keyed by block: `<block:09>[-<tx>].bin`
    Cache,
}

/// One file from a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub kind: EntryKind,
    pub path: PathBuf,
}

impl CacheEntry {
    pub fn new(kind: EntryKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// The block range this entry covers, if its name encodes one.
    pub fn range(&self) -> Option<FileRange> {
        match self.kind {
            EntryKind::Chunk | EntryKind::Bloom => FileRange::from_filename(&self.path).ok(),
            EntryKind::Cache => cache_block(&self.path).map(FileRange::from_block),
        }
    }
}

/// Files to remove after a reorg.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecachePlan {
    pub chunks: Vec<PathBuf>,
    pub blooms: Vec<PathBuf>,
    pub cache_items: Vec<PathBuf>,
    /// Entries whose names could not be read as a range. Never deleted.
    pub skipped: Vec<PathBuf>,
}

impl DecachePlan {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.blooms.is_empty() && self.cache_items.is_empty()
    }

    /// Number of files the plan would remove.
    pub fn len(&self) -> usize {
        self.chunks.len() + self.blooms.len() + self.cache_items.len()
    }

    /// Every path to remove, chunks first.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.chunks
            .iter()
            .chain(self.blooms.iter())
            .chain(self.cache_items.iter())
    }

    /// Remove every planned file.
    ///
    /// Files already gone are counted as `missing`, not as errors. The first
    /// other I/O error stops execution.
    pub fn execute(&self) -> Result<DecacheOutcome, (PathBuf, io::Error)> {
        let mut outcome = DecacheOutcome::default();
        for path in self.paths() {
            match fs::remove_file(path) {
                Ok(()) => outcome.removed.push(path.clone()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    outcome.missing.push(path.clone())
                }
                Err(e) => return Err((path.clone(), e)),
            }
        }
        Ok(outcome)
    }
}

/// What `DecachePlan::execute` actually did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecacheOutcome {
    pub removed: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

/// Select every entry whose range intersects any invalidated range.
pub fn plan_decache(invalidated: &[FileRange], entries: &[CacheEntry]) -> DecachePlan {
    let mut plan = DecachePlan::default();

    for entry in entries {
        let Some(range) = entry.range() else {
            plan.skipped.push(entry.path.clone());
            continue;
        };
        if !invalidated.iter().any(|bad| bad.intersects(&range)) {
            continue;
        }
        let bucket = match entry.kind {
            EntryKind::Chunk => &mut plan.chunks,
            EntryKind::Bloom => &mut plan.blooms,
            EntryKind::Cache => &mut plan.cache_items,
        };
        bucket.push(entry.path.clone());
    }

    plan.chunks.sort();
    plan.blooms.sort();
    plan.cache_items.sort();
    plan
}

/// Block number of a derived cache item: the leading nine digits of the
/// stem, followed by the end of the stem or a `-`.
fn cache_block(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    let digits = stem.get(..RANGE_DIGITS)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match stem.as_bytes().get(RANGE_DIGITS) {
        None | Some(b'-') => digits.parse().ok(),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<CacheEntry> {
        vec![
            CacheEntry::new(EntryKind::Chunk, "/idx/finalized/000000000-000000099.bin"),
            CacheEntry::new(EntryKind::Chunk, "/idx/finalized/000000100-000000199.bin"),
            CacheEntry::new(EntryKind::Chunk, "/idx/finalized/000000200-000000299.bin"),
            CacheEntry::new(EntryKind::Bloom, "/idx/blooms/000000100-000000199.bloom"),
            CacheEntry::new(EntryKind::Bloom, "/idx/blooms/000000200-000000299.bloom"),
            CacheEntry::new(EntryKind::Cache, "/cache/blocks/00/00/01/000000150.bin"),
            CacheEntry::new(EntryKind::Cache, "/cache/txs/00/00/02/000000250-00003.bin"),
            CacheEntry::new(EntryKind::Cache, "/cache/txs/00/00/00/000000050-00001.bin"),
            CacheEntry::new(EntryKind::Cache, "/cache/blocks/readme.txt"),
            CacheEntry::new(EntryKind::Chunk, "/idx/finalized/garbage.bin"),
        ]
    }

    #[test]
    fn test_plan_selects_intersecting_entries() {
        let plan = plan_decache(&[FileRange::new(150, 210)], &listing());

        assert_eq!(
            plan.chunks,
            vec![
                PathBuf::from("/idx/finalized/000000100-000000199.bin"),
                PathBuf::from("/idx/finalized/000000200-000000299.bin"),
            ]
        );
        assert_eq!(plan.blooms.len(), 2);
        assert_eq!(
            plan.cache_items,
            vec![PathBuf::from("/cache/blocks/00/00/01/000000150.bin")]
        );
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_reorg_from_takes_the_tail() {
        let plan = plan_decache(&[FileRange::reorg_from(200)], &listing());
        assert_eq!(plan.chunks.len(), 1);
        assert_eq!(plan.blooms.len(), 1);
        assert_eq!(
            plan.cache_items,
            vec![PathBuf::from("/cache/txs/00/00/02/000000250-00003.bin")]
        );
    }

    #[test]
    fn test_unreadable_names_are_skipped() {
        let plan = plan_decache(&[FileRange::reorg_from(0)], &listing());
        assert_eq!(
            plan.skipped,
            vec![
                PathBuf::from("/cache/blocks/readme.txt"),
                PathBuf::from("/idx/finalized/garbage.bin"),
            ]
        );
        assert!(!plan.paths().any(|p| p.ends_with("readme.txt")));
    }

    #[test]
    fn test_no_invalidation_is_empty_plan() {
        let plan = plan_decache(&[], &listing());
        assert!(plan.is_empty());
        let plan = plan_decache(&[FileRange::new(1000, 2000)], &listing());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_cache_block_parsing() {
        assert_eq!(cache_block(Path::new("a/000000150.bin")), Some(150));
        assert_eq!(cache_block(Path::new("000000250-00003.bin")), Some(250));
        assert_eq!(cache_block(Path::new("0000001500.bin")), None);
        assert_eq!(cache_block(Path::new("00000015.bin")), None);
        assert_eq!(cache_block(Path::new("x00000150.bin")), None);
    }

    #[test]
    fn test_execute_removes_and_counts_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("000000001-000000002.bin");
        let absent = dir.path().join("000000003-000000004.bin");
        fs::write(&present, b"x").unwrap();

        let plan = DecachePlan {
            chunks: vec![present.clone(), absent.clone()],
            ..Default::default()
        };
        let outcome = plan.execute().unwrap();

        assert_eq!(outcome.removed, vec![present.clone()]);
        assert_eq!(outcome.missing, vec![absent]);
        assert!(!present.exists());
    }
}
