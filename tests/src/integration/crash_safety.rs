//! # Crash Safety
//!
//! A writer that dies at any point must leave each chunk either as it was
//! or fully replaced. These tests fake the debris an interrupted process
//! leaves in `tmp/` and check that reopening (or the next write) repairs it.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    use chunk_index::adapters::fs::backup::{backup_path_for, commit_marker_for, created_marker_for};
    use chunk_index::{
        CancellationFlag, ChunkIndexApi, ChunkIndexService, FileRange, IndexError, VersionTag,
        QUARANTINE_MARKER,
    };
    use parking_lot::Mutex;

    use crate::fixtures::{addresses_of, working_set, ScratchIndex};

    fn tmp_entries(index: &ChunkIndexService) -> Vec<String> {
        fs::read_dir(index.tmp_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    // =============================================================================
    // INTERRUPTED REPLACE
    // =============================================================================

    #[test]
    fn test_interrupted_replace_rolls_back_on_reopen() {
        let scratch = ScratchIndex::new("crash");
        let range = FileRange::new(0, 999);
        let (map, total) = working_set(1, range, 100, 3);

        let (chunk_before, bloom_before) = {
            let index = scratch.open().unwrap();
            index
                .write_chunk(range, &map, total, &CancellationFlag::new())
                .unwrap();
            let chunk_path = index.chunk_path(&range);
            let bloom_path = index.bloom_path(&range);
            let chunk_before = fs::read(&chunk_path).unwrap();
            let bloom_before = fs::read(&bloom_path).unwrap();

            // Died after both backups were taken and the chunk was rewritten.
            let tmp = index.tmp_dir();
            fs::write(backup_path_for(&tmp, &chunk_path), &chunk_before).unwrap();
            fs::write(backup_path_for(&tmp, &bloom_path), &bloom_before).unwrap();
            fs::write(&chunk_path, &chunk_before[..chunk_before.len() / 2]).unwrap();
            (chunk_before, bloom_before)
        };

        let index = scratch.open().unwrap();
        assert_eq!(fs::read(index.chunk_path(&range)).unwrap(), chunk_before);
        assert_eq!(fs::read(index.bloom_path(&range)).unwrap(), bloom_before);
        assert!(tmp_entries(&index).is_empty());
        assert!(index.audit(range, &index.version_tag()).unwrap().is_healthy());
    }

    #[test]
    fn test_interrupted_first_write_leaves_no_chunk() {
        let scratch = ScratchIndex::new("crash");
        let range = FileRange::new(1_000, 1_999);

        {
            let index = scratch.open().unwrap();
            let chunk_path = index.chunk_path(&range);
            let bloom_path = index.bloom_path(&range);
            let tmp = index.tmp_dir();
            fs::write(created_marker_for(&tmp, &chunk_path), b"").unwrap();
            fs::write(created_marker_for(&tmp, &bloom_path), b"").unwrap();
            fs::write(&chunk_path, b"partial").unwrap();
            let partial = index.index_dir().join(".000001000-000001999.bin.partial");
            fs::write(partial, b"partial").unwrap();
        }

        let index = scratch.open().unwrap();
        assert!(!index.chunk_path(&range).exists());
        assert!(!index.bloom_path(&range).exists());
        assert_eq!(fs::read_dir(index.index_dir()).unwrap().count(), 0);
        assert!(tmp_entries(&index).is_empty());
    }

    #[test]
    fn test_unrestorable_backup_quarantines_until_cleared() {
        let scratch = ScratchIndex::new("crash");
        let range = FileRange::new(0, 999);

        {
            let index = scratch.open().unwrap();
            let chunk_path = index.chunk_path(&range);
            fs::create_dir_all(chunk_path.join("in-the-way")).unwrap();
            fs::write(backup_path_for(&index.tmp_dir(), &chunk_path), b"old").unwrap();
        }

        // Opening tries the restore, fails, and quarantines.
        let index = scratch.open().unwrap();
        assert!(index.is_quarantined());
        assert!(tmp_entries(&index).contains(&QUARANTINE_MARKER.to_string()));

        let (map, total) = working_set(2, FileRange::new(1_000, 1_999), 10, 2);
        let err = index
            .write_chunk(FileRange::new(1_000, 1_999), &map, total, &CancellationFlag::new())
            .unwrap_err();
        assert!(matches!(err, IndexError::DirectoryQuarantined { .. }));

        // An operator fixes the directory by hand.
        fs::remove_dir_all(index.chunk_path(&range)).unwrap();
        index.clear_quarantine().unwrap();
        let report = index.recover().unwrap();
        assert_eq!(report.restored, vec![index.chunk_path(&range)]);
        assert!(!index.is_quarantined());
        index
            .write_chunk(FileRange::new(1_000, 1_999), &map, total, &CancellationFlag::new())
            .unwrap();
    }

    /// Write `first`, then `second` over the same range. Returns the files
    /// as they were after the first write.
    fn write_twice(
        index: &ChunkIndexService,
        range: FileRange,
        first: u64,
        second: u64,
    ) -> (Vec<u8>, Vec<u8>) {
        let (map, total) = working_set(first, range, 80, 3);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();
        let old_chunk = fs::read(index.chunk_path(&range)).unwrap();
        let old_bloom = fs::read(index.bloom_path(&range)).unwrap();

        let (map, total) = working_set(second, range, 80, 3);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();
        (old_chunk, old_bloom)
    }

    fn commit_body(index: &ChunkIndexService, range: FileRange) -> String {
        format!(
            "{}\n{}\n",
            index.chunk_path(&range).file_name().unwrap().to_string_lossy(),
            index.bloom_path(&range).file_name().unwrap().to_string_lossy()
        )
    }

    #[test]
    fn test_crash_between_clears_keeps_new_pair() {
        let scratch = ScratchIndex::new("crash");
        let range = FileRange::new(0, 999);
        let (new_map, _) = working_set(12, range, 80, 3);

        let (new_chunk, new_bloom) = {
            let index = scratch.open().unwrap();
            let (_, old_bloom) = write_twice(&index, range, 11, 12);

            // Died after the commit marker and the chunk backup's removal,
            // before the bloom backup went.
            let tmp = index.tmp_dir();
            let bloom_path = index.bloom_path(&range);
            let marker = commit_marker_for(&tmp, &index.chunk_path(&range));
            fs::write(marker, commit_body(&index, range)).unwrap();
            fs::write(backup_path_for(&tmp, &bloom_path), &old_bloom).unwrap();
            (
                fs::read(index.chunk_path(&range)).unwrap(),
                fs::read(&bloom_path).unwrap(),
            )
        };

        let index = scratch.open().unwrap();
        assert_eq!(fs::read(index.chunk_path(&range)).unwrap(), new_chunk);
        assert_eq!(fs::read(index.bloom_path(&range)).unwrap(), new_bloom);
        assert!(tmp_entries(&index).is_empty());
        for address in addresses_of(&new_map) {
            assert!(index.query_address(range, &address).unwrap().is_some());
        }
        assert!(index.audit(range, &index.version_tag()).unwrap().is_healthy());
    }

    #[test]
    fn test_lone_bloom_backup_is_not_restored() {
        let scratch = ScratchIndex::new("crash");
        let range = FileRange::new(0, 99);
        let (new_map, _) = working_set(22, range, 80, 3);

        {
            let index = scratch.open().unwrap();
            let (_, old_bloom) = write_twice(&index, range, 21, 22);
            let bloom_path = index.bloom_path(&range);
            fs::write(backup_path_for(&index.tmp_dir(), &bloom_path), old_bloom).unwrap();
        }

        let index = scratch.open().unwrap();
        assert!(tmp_entries(&index).is_empty());
        for address in addresses_of(&new_map) {
            assert!(
                index.query_address(range, &address).unwrap().is_some(),
                "{} lost behind a stale bloom",
                address
            );
        }
    }

    #[test]
    fn test_leftover_commit_marker_is_settled_before_next_write() {
        let scratch = ScratchIndex::new("crash");
        let index = scratch.open().unwrap();
        let range = FileRange::new(0, 999);
        let (old_chunk, _) = write_twice(&index, range, 31, 32);

        // A committed write whose cleanup stopped early, found by a live
        // process rather than on open.
        let tmp = index.tmp_dir();
        let marker = commit_marker_for(&tmp, &index.chunk_path(&range));
        fs::write(marker, commit_body(&index, range)).unwrap();
        fs::write(backup_path_for(&tmp, &index.chunk_path(&range)), old_chunk).unwrap();

        let (map, total) = working_set(33, range, 40, 2);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();
        assert!(tmp_entries(&index).is_empty());
        for address in addresses_of(&map) {
            assert!(index.query_address(range, &address).unwrap().is_some());
        }
    }

    // =============================================================================
    // CORRUPT HEADERS
    // =============================================================================

    #[test]
    fn test_bloom_count_beyond_file_is_an_error() {
        let scratch = ScratchIndex::new("crash");
        let index = scratch.open().unwrap();
        let range = FileRange::new(0, 999);
        let (map, total) = working_set(41, range, 20, 2);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();

        let bloom_path = index.bloom_path(&range);
        let mut bytes = fs::read(&bloom_path).unwrap();
        bytes[34..38].copy_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&bloom_path, bytes).unwrap();

        let address = addresses_of(&map)[0];
        assert!(matches!(
            index.query_address(range, &address),
            Err(IndexError::Bloom { .. })
        ));
    }

    #[test]
    fn test_chunk_counts_beyond_file_are_errors() {
        let scratch = ScratchIndex::new("crash");
        let index = scratch.open().unwrap();
        let range = FileRange::new(0, 999);
        let (map, total) = working_set(42, range, 20, 2);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();

        // Without a bloom every lookup reads the tables directly.
        fs::remove_file(index.bloom_path(&range)).unwrap();
        let chunk_path = index.chunk_path(&range);
        let mut bytes = fs::read(&chunk_path).unwrap();
        bytes[36..40].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&chunk_path, bytes).unwrap();

        let address = addresses_of(&map)[0];
        assert!(matches!(
            index.query_address(range, &address),
            Err(IndexError::Corrupt { .. })
        ));
        let retag = VersionTag::from_manifest_version("crash-retag");
        assert!(matches!(
            index.tag_chunk(range, &retag),
            Err(IndexError::Corrupt { .. })
        ));
        assert!(!index.bloom_path(&range).exists());
        assert!(tmp_entries(&index).is_empty());
    }

    // =============================================================================
    // CONTENTION
    // =============================================================================

    #[test]
    fn test_concurrent_writers_same_range_never_tear() {
        let scratch = ScratchIndex::new("crash");
        let index = Arc::new(scratch.open().unwrap());
        let range = FileRange::new(0, 999);
        let winners = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..6u64)
            .map(|seed| {
                let index = Arc::clone(&index);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    let (map, total) = working_set(50 + seed, range, 60, 3);
                    index
                        .write_chunk(range, &map, total, &CancellationFlag::new())
                        .unwrap();
                    winners.lock().push(map);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Exactly one writer's set is on disk, whole.
        let audit = index.audit(range, &index.version_tag()).unwrap();
        assert!(audit.is_healthy(), "{:?}", audit.problems);
        assert_eq!(audit.address_count, 60);
        let complete = winners
            .lock()
            .iter()
            .filter(|map| {
                addresses_of(map)
                    .iter()
                    .all(|a| index.query_address(range, a).unwrap().is_some())
            })
            .count();
        assert_eq!(complete, 1);
        assert!(tmp_entries(&index).is_empty());
    }

    #[test]
    fn test_exclusive_open_rejects_second_process_handle() {
        let scratch = ScratchIndex::new("crash");
        let held = ChunkIndexService::open_exclusive(scratch.config.clone()).unwrap();
        assert!(matches!(
            ChunkIndexService::open_exclusive(scratch.config.clone()),
            Err(IndexError::Lock(_))
        ));
        drop(held);
        assert!(ChunkIndexService::open_exclusive(scratch.config.clone()).is_ok());
    }

    #[test]
    fn test_cancelled_rewrite_keeps_old_chunk() {
        let scratch = ScratchIndex::new("crash");
        let index = scratch.open().unwrap();
        let range = FileRange::new(0, 999);
        let (map, total) = working_set(7, range, 30, 2);
        index
            .write_chunk(range, &map, total, &CancellationFlag::new())
            .unwrap();
        let before = fs::read(index.chunk_path(&range)).unwrap();

        let (next, next_total) = working_set(8, range, 30, 2);
        let cancel = CancellationFlag::new();
        cancel.cancel();
        assert!(matches!(
            index.write_chunk(range, &next, next_total, &cancel),
            Err(IndexError::Cancelled { .. })
        ));
        assert_eq!(fs::read(index.chunk_path(&range)).unwrap(), before);
    }
}
